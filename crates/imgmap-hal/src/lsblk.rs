//! Parsing for `lsblk -ln -o NAME,TYPE` output.

/// Kernel names of the rows whose name starts with `partition_prefix` and whose type is
/// `part`, in listing order. Rows that do not have exactly two fields are ignored.
pub fn partition_names(output: &str, partition_prefix: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            match fields.as_slice() {
                [name, kind] if name.starts_with(partition_prefix) && *kind == "part" => {
                    Some(name.to_string())
                }
                _ => None,
            }
        })
        .collect()
}
