//! AES-256 in Infinite Garble Extension (IGE) mode.
//!
//! IGE is not part of the `aes` crate's block-mode offering (it only ships
//! ECB/CBC/CTR-style modes via `cipher`), so it's built here directly on
//! top of `aes::Aes256`'s raw block operations, chaining each block against
//! both the previous plaintext and the previous ciphertext block:
//!
//! ```text
//! encrypt: c[i] = E(p[i] ^ c[i-1]) ^ p[i-1]
//! decrypt: p[i] = D(c[i] ^ p[i-1]) ^ c[i-1]
//! ```
//!
//! `iv` is 32 bytes: the first 16 seed `c[-1]`, the last 16 seed `p[-1]`.

use aes::cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes256;

/// Encrypt `data` in place. `data.len()` must be a multiple of 16.
pub fn ige_encrypt(data: &mut [u8], key: &[u8; 32], iv: &[u8; 32]) {
    assert_eq!(data.len() % 16, 0, "IGE operates on whole 16-byte blocks");
    let cipher = Aes256::new(GenericArray::from_slice(key));

    let mut prev_cipher = [0u8; 16];
    let mut prev_plain = [0u8; 16];
    prev_cipher.copy_from_slice(&iv[..16]);
    prev_plain.copy_from_slice(&iv[16..]);

    for block in data.chunks_mut(16) {
        let plain: [u8; 16] = block.try_into().unwrap();

        let mut xored = [0u8; 16];
        for i in 0..16 {
            xored[i] = plain[i] ^ prev_cipher[i];
        }
        let mut ga = GenericArray::clone_from_slice(&xored);
        cipher.encrypt_block(&mut ga);
        for i in 0..16 {
            ga[i] ^= prev_plain[i];
        }

        block.copy_from_slice(&ga);
        prev_cipher.copy_from_slice(block);
        prev_plain = plain;
    }
}

/// Decrypt `data` in place. `data.len()` must be a multiple of 16.
pub fn ige_decrypt(data: &mut [u8], key: &[u8; 32], iv: &[u8; 32]) {
    assert_eq!(data.len() % 16, 0, "IGE operates on whole 16-byte blocks");
    let cipher = Aes256::new(GenericArray::from_slice(key));

    let mut prev_cipher = [0u8; 16];
    let mut prev_plain = [0u8; 16];
    prev_cipher.copy_from_slice(&iv[..16]);
    prev_plain.copy_from_slice(&iv[16..]);

    for block in data.chunks_mut(16) {
        let cipher_block: [u8; 16] = block.try_into().unwrap();

        let mut xored = [0u8; 16];
        for i in 0..16 {
            xored[i] = cipher_block[i] ^ prev_plain[i];
        }
        let mut ga = GenericArray::clone_from_slice(&xored);
        cipher.decrypt_block(&mut ga);
        for i in 0..16 {
            ga[i] ^= prev_cipher[i];
        }

        block.copy_from_slice(&ga);
        prev_cipher = cipher_block;
        prev_plain.copy_from_slice(block);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let key = [7u8; 32];
        let iv = [9u8; 32];
        let mut data = (0u8..64).collect::<Vec<u8>>();
        let original = data.clone();

        ige_encrypt(&mut data, &key, &iv);
        assert_ne!(data, original);
        ige_decrypt(&mut data, &key, &iv);
        assert_eq!(data, original);
    }

    #[test]
    fn chaining_propagates() {
        // Flipping a bit in the first ciphertext block must scramble every
        // later block when decrypted (the garble-extension property).
        let key = [3u8; 32];
        let iv = [5u8; 32];
        let mut data = vec![0u8; 48];
        ige_encrypt(&mut data, &key, &iv);

        let mut corrupted = data.clone();
        corrupted[0] ^= 1;

        let mut a = data.clone();
        let mut b = corrupted.clone();
        ige_decrypt(&mut a, &key, &iv);
        ige_decrypt(&mut b, &key, &iv);
        assert_ne!(a[16..], b[16..], "corruption must propagate to later blocks");
    }
}
