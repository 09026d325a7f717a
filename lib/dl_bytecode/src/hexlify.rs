#[must_use]
pub(crate) fn hexlify(arr: &[u8]) -> String {
    arr.iter()
        .map(|x| format!("{x:02x}"))
        .collect::<Vec<String>>()
        .concat()
}

/// Renders code units the way they are laid out in a dex file (little endian).
#[must_use]
pub(crate) fn hexlify_units(units: &[u16]) -> String {
    let bytes: Vec<u8> = units.iter().flat_map(|u| u.to_le_bytes()).collect();
    hexlify(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hexlify_test() {
        assert_eq!(hexlify(&vec![15, 60, 99]), String::from("0f3c63"));
    }

    #[test]
    fn hexlify_units_test() {
        assert_eq!(hexlify_units(&[0x107b, 0x0001]), String::from("7b100100"));
    }
}
