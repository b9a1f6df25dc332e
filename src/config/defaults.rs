//! Default configuration values

/// Space reserved after the boot image for the kernel log dump
pub const KLOG_DUMP_SIZE: u64 = 4 * 1024;

/// Absolute symlink hops allowed inside an overlay root before giving up
pub const MAX_SYMLINK_HOPS: usize = 40;

/// Chunk size used when streaming the boot image into the output file
pub const BOOT_COPY_BUFFER_SIZE: usize = 8192;

/// Value of the root `klibs` marker once klibs are staged
pub const KLIBS_MARKER: &str = "bootfs";

/// Boot filesystem directory holding klibs
pub const KLIB_DIR: &str = "klib";

/// Boot filesystem entry name for the kernel
pub const KERNEL_NAME: &str = "kernel";

/// Build plan file looked up when none is given
pub const DEFAULT_PLAN_FILE: &str = "stage.toml";

/// Minimum proptest iterations
pub const MIN_PROPTEST_ITERATIONS: u32 = 100;
