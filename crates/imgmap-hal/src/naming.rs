//! Loop device and partition naming helpers.
//!
//! The kernel names partitions of a loop device `<loop>p<index>`, e.g. `/dev/loop7p2`.

const DEV_PREFIX: &str = "/dev/";
const LOOP_DEV_PREFIX: &str = "/dev/loop";

/// Kernel name of a loop device path: `/dev/loop7` -> `loop7`.
pub fn loop_name(loop_device: &str) -> Option<&str> {
    let name = loop_device.rsplit('/').next()?;
    let digits = name.strip_prefix("loop")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(name)
}

/// Prefix shared by every partition of `loop_name`: `loop7` -> `loop7p`.
pub fn partition_prefix(loop_name: &str) -> String {
    format!("{}p", loop_name)
}

/// Numeric partition index of `name` if it is a partition of `loop_name`.
///
/// Accepts both kernel names (`loop7p10`) and device paths (`/dev/loop7p10`).
pub fn partition_index(name: &str, loop_name: &str) -> Option<u32> {
    let name = name.strip_prefix(DEV_PREFIX).unwrap_or(name);
    let digits = name.strip_prefix(loop_name)?.strip_prefix('p')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Loop device owning a partition path: `/dev/loop10p1` -> `/dev/loop10`.
///
/// Also accepts the loop device itself. Returns `None` when the path carries no
/// `/dev/loop<N>` segment (e.g. a `/dev/mapper` volume).
pub fn loop_device_of(path: &str) -> Option<String> {
    for (start, _) in path.match_indices(LOOP_DEV_PREFIX) {
        let rest = &path[start + LOOP_DEV_PREFIX.len()..];
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits > 0 {
            return Some(format!("{}{}", LOOP_DEV_PREFIX, &rest[..digits]));
        }
    }
    None
}

/// Whether a device-mapper name was created from `loop_name` itself (kpartx style,
/// `loop7p1`), without matching `loop70p1` for `loop7`.
pub fn named_after_loop(mapper_name: &str, loop_name: &str) -> bool {
    match mapper_name.strip_prefix(loop_name) {
        Some(rest) => !rest.starts_with(|c: char| c.is_ascii_digit()),
        None => false,
    }
}
