//! `<digits>[K|M|G]` memory-size parsing (spec.md §6 "Memory string
//! parsing"), 1024-based units.

pub fn parse_memory_size(input: &str) -> Result<u64, String> {
    let (digits, multiplier) = match input.chars().last() {
        Some('K') => (&input[..input.len() - 1], 1024),
        Some('M') => (&input[..input.len() - 1], 1024 * 1024),
        Some('G') => (&input[..input.len() - 1], 1024 * 1024 * 1024),
        Some(c) if c.is_ascii_digit() => (input, 1),
        _ => {
            return Err(format!("invalid memory size '{input}': expected digits optionally followed by K, M, or G"));
        },
    };

    let value: u64 = digits.parse().map_err(|_| format!("invalid memory size '{input}': not a number"))?;
    Ok(value * multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_digits_are_bytes() {
        assert_eq!(parse_memory_size("512").unwrap(), 512);
    }

    #[test]
    fn kilobytes_are_1024_based() {
        assert_eq!(parse_memory_size("64K").unwrap(), 64 * 1024);
    }

    #[test]
    fn megabytes_and_gigabytes() {
        assert_eq!(parse_memory_size("2M").unwrap(), 2 * 1024 * 1024);
        assert_eq!(parse_memory_size("1G").unwrap(), 1024 * 1024 * 1024);
    }

    #[test]
    fn unknown_suffix_is_an_error() {
        assert!(parse_memory_size("64X").is_err());
    }

    #[test]
    fn non_numeric_is_an_error() {
        assert!(parse_memory_size("abc").is_err());
    }
}
