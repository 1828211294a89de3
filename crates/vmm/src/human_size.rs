//! Human-readable byte sizes for log output.

use core::fmt;

/// Formats a byte count using binary prefixes.
///
/// Sizes that are an exact multiple of a unit print in that unit; anything else falls back to
/// the next smaller unit that divides it, so no floating point is needed on the target.
///
/// # Examples
///
/// ```
/// use vmm::HumanSize;
///
/// assert_eq!(format!("{}", HumanSize(0)), "0B");
/// assert_eq!(format!("{}", HumanSize(4096)), "4KiB");
/// assert_eq!(format!("{}", HumanSize(0x2_0000)), "128KiB");
/// assert_eq!(format!("{}", HumanSize(0x900_0000)), "144MiB");
/// assert_eq!(format!("{}", HumanSize(4097)), "4097B");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct HumanSize(pub usize);

impl fmt::Display for HumanSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const UNITS: [(usize, &str); 3] = [(1 << 30, "GiB"), (1 << 20, "MiB"), (1 << 10, "KiB")];

        for (scale, unit) in UNITS {
            if self.0 >= scale && self.0 % scale == 0 {
                return write!(f, "{}{}", self.0 / scale, unit);
            }
        }
        write!(f, "{}B", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_bytes() {
        assert_eq!(format!("{}", HumanSize(1)), "1B");
        assert_eq!(format!("{}", HumanSize(1023)), "1023B");
    }

    #[test]
    fn formats_exact_units() {
        assert_eq!(format!("{}", HumanSize(1024)), "1KiB");
        assert_eq!(format!("{}", HumanSize(16 * 1024)), "16KiB");
        assert_eq!(format!("{}", HumanSize(1 << 20)), "1MiB");
        assert_eq!(format!("{}", HumanSize(1 << 30)), "1GiB");
    }

    #[test]
    fn falls_back_to_smaller_unit() {
        assert_eq!(format!("{}", HumanSize(1536)), "1536B");
        assert_eq!(format!("{}", HumanSize(0x18_0000)), "1536KiB");
    }
}
