/// Align upwards.
///
/// Returns the smallest x with alignment `align` so that x >= addr, or
/// `None` if that would overflow. The alignment must be a power of 2.
pub const fn align_up(addr: usize, align: usize) -> Option<usize> {
    debug_assert!(align.is_power_of_two());
    match addr.checked_add(align - 1) {
        Some(bumped) => Some(bumped & !(align - 1)),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::align_up;

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 16), Some(0));
        assert_eq!(align_up(1, 16), Some(16));
        assert_eq!(align_up(16, 16), Some(16));
        assert_eq!(align_up(65537, 16), Some(65552));
        assert_eq!(align_up(usize::MAX, 16), None);
    }
}
