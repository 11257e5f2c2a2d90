//! Repeating-key XOR stream cipher.
//!
//! Used both for the MIDI-block key (obfuscating the 259-byte sub-block
//! header+payload before 7/8-packing) and the application key (obfuscating
//! the executable code region in flash). The cipher is symmetric: applying
//! it twice with the same key is the identity.

/// XOR `data` with `key`, cycling the key as needed.
///
/// Keys are treated as raw byte sequences: a trailing NUL in an ASCII key
/// literal is significant and must not be trimmed by the caller.
pub fn xor(key: &[u8], data: &[u8]) -> Vec<u8> {
    if key.is_empty() {
        return data.to_vec();
    }
    data.iter()
        .enumerate()
        .map(|(i, &b)| b ^ key[i % key.len()])
        .collect()
}

/// XOR `data` with `key` in place.
pub fn xor_in_place(key: &[u8], data: &mut [u8]) {
    if key.is_empty() {
        return;
    }
    for (i, b) in data.iter_mut().enumerate() {
        *b ^= key[i % key.len()];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symmetry() {
        let key = b"TZ'04";
        let data = b"the quick brown fox jumps over the lazy dog";
        let encrypted = xor(key, data);
        let decrypted = xor(key, &encrypted);
        assert_eq!(decrypted, data);
    }

    #[test]
    fn test_key_cycles() {
        let key = b"AB";
        let data = [0x00, 0x00, 0x00, 0x00];
        let out = xor(key, &data);
        assert_eq!(out, vec![b'A', b'B', b'A', b'B']);
    }

    #[test]
    fn test_in_place_matches_allocating() {
        let key = b"key";
        let data = b"some payload bytes".to_vec();
        let mut in_place = data.clone();
        xor_in_place(key, &mut in_place);
        assert_eq!(in_place, xor(key, &data));
    }

    #[test]
    fn test_embedded_nul_is_significant() {
        // The application key is 56 bytes with a trailing NUL that must be
        // treated as a real key byte, not a C-string terminator.
        let key: &[u8] = b"- ORIGINAL BEHRINGER CODE - COPYRIGHT 2004 - BGER/TZ - \0";
        assert_eq!(key.len(), 56);
        let data = vec![0u8; 56];
        let encrypted = xor(key, &data);
        // Byte 55 of the ciphertext must reflect the NUL key byte, i.e. be
        // unchanged from the plaintext zero at that position XORed with 0.
        assert_eq!(encrypted[55], 0x00);
        assert_eq!(xor(key, &encrypted), data);
    }
}
