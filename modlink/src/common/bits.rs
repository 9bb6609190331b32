pub(crate) fn num_bytes_for_bits(count: u16) -> usize {
    (count as usize + 7) / 8
}

/// pack bits LSB-first, bit i of byte j holds value 8*j + i
pub(crate) fn pack_bits(values: &[bool]) -> impl Iterator<Item = u8> + '_ {
    values.chunks(8).map(|chunk| {
        chunk
            .iter()
            .enumerate()
            .fold(0u8, |acc, (i, bit)| if *bit { acc | (1 << i) } else { acc })
    })
}

/// unpack `count` bits stored LSB-first, ignoring any padding bits in the last byte
pub(crate) fn unpack_bits(bytes: &[u8], count: u16) -> Vec<bool> {
    (0..count as usize)
        .map(|j| match bytes.get(j / 8) {
            Some(byte) => (byte >> (j % 8)) & 1 != 0,
            None => false,
        })
        .collect()
}
