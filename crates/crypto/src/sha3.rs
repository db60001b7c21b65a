//! SHA3-256 per FIPS 202: Keccak-f[1600] with rate 1088 bits, capacity 512
//! bits, domain separation suffix `0x06`, 32-byte output.

const ROUNDS: usize = 24;
const RATE_BYTES: usize = 136; // 1088 bits
const OUTPUT_BYTES: usize = 32;
const DOMAIN_SUFFIX: u8 = 0x06;

const ROUND_CONSTANTS: [u64; ROUNDS] = [
    0x0000_0000_0000_0001,
    0x0000_0000_0000_8082,
    0x8000_0000_0000_808a,
    0x8000_0000_8000_8000,
    0x0000_0000_0000_808b,
    0x0000_0000_8000_0001,
    0x8000_0000_8000_8081,
    0x8000_0000_0000_8009,
    0x0000_0000_0000_008a,
    0x0000_0000_0000_0088,
    0x0000_0000_8000_8009,
    0x0000_0000_8000_000a,
    0x0000_0000_8000_808b,
    0x8000_0000_0000_008b,
    0x8000_0000_0000_8089,
    0x8000_0000_0000_8003,
    0x8000_0000_0000_8002,
    0x8000_0000_0000_0080,
    0x0000_0000_0000_800a,
    0x8000_0000_8000_000a,
    0x8000_0000_8000_8081,
    0x8000_0000_0000_8080,
    0x0000_0000_8000_0001,
    0x8000_0000_8000_8008,
];

const RHO_OFFSETS: [[u32; 5]; 5] = [
    [0, 36, 3, 41, 18],
    [1, 44, 10, 45, 2],
    [62, 6, 43, 15, 61],
    [28, 55, 25, 21, 56],
    [27, 20, 39, 8, 14],
];

/// A Keccak-`p[1600, 24]` state: 25 lanes of 64 bits, indexed `state[x][y]`.
#[derive(Clone)]
struct KeccakState([[u64; 5]; 5]);

impl KeccakState {
    fn new() -> Self {
        Self([[0u64; 5]; 5])
    }

    fn xor_byte(&mut self, byte_offset: usize, value: u8) {
        let lane_index = byte_offset / 8;
        let shift = (byte_offset % 8) * 8;
        let x = lane_index % 5;
        let y = lane_index / 5;
        self.0[x][y] ^= (value as u64) << shift;
    }

    fn permute(&mut self) {
        for round in 0..ROUNDS {
            self.theta();
            self.rho_and_pi();
            self.chi();
            self.iota(round);
        }
    }

    fn theta(&mut self) {
        let mut c = [0u64; 5];
        for x in 0..5 {
            c[x] = self.0[x][0] ^ self.0[x][1] ^ self.0[x][2] ^ self.0[x][3] ^ self.0[x][4];
        }
        let mut d = [0u64; 5];
        for x in 0..5 {
            d[x] = c[(x + 4) % 5] ^ c[(x + 1) % 5].rotate_left(1);
        }
        for x in 0..5 {
            for y in 0..5 {
                self.0[x][y] ^= d[x];
            }
        }
    }

    fn rho_and_pi(&mut self) {
        let mut out = [[0u64; 5]; 5];
        for x in 0..5 {
            for y in 0..5 {
                let new_x = y;
                let new_y = (2 * x + 3 * y) % 5;
                out[new_x][new_y] = self.0[x][y].rotate_left(RHO_OFFSETS[x][y]);
            }
        }
        self.0 = out;
    }

    fn chi(&mut self) {
        let original = self.0;
        for x in 0..5 {
            for y in 0..5 {
                self.0[x][y] = original[x][y] ^ (!original[(x + 1) % 5][y] & original[(x + 2) % 5][y]);
            }
        }
    }

    fn iota(&mut self, round: usize) {
        self.0[0][0] ^= ROUND_CONSTANTS[round];
    }
}

/// Streaming SHA3-256 hasher.
///
/// ```
/// use crypto::{Sha3_256, to_hex};
///
/// let digest = Sha3_256::digest_oneshot(b"");
/// assert_eq!(to_hex(&digest).len(), 64);
/// ```
#[derive(Clone)]
pub struct Sha3_256 {
    state: KeccakState,
    block: [u8; RATE_BYTES],
    block_len: usize,
}

impl Sha3_256 {
    pub fn new() -> Self {
        Self {
            state: KeccakState::new(),
            block: [0u8; RATE_BYTES],
            block_len: 0,
        }
    }

    /// Human-readable algorithm name used in document-digest text
    /// (`"<algorithm> <hex>"`).
    pub fn algorithm_name() -> &'static str {
        "sha3-256"
    }

    /// Feed more bytes into the running hash.
    pub fn update(&mut self, mut bytes: &[u8]) {
        if self.block_len > 0 {
            let space = RATE_BYTES - self.block_len;
            let take = space.min(bytes.len());
            self.block[self.block_len..self.block_len + take].copy_from_slice(&bytes[..take]);
            self.block_len += take;
            bytes = &bytes[take..];
            if self.block_len == RATE_BYTES {
                self.absorb_block();
                self.block_len = 0;
            }
        }
        while bytes.len() >= RATE_BYTES {
            let (chunk, rest) = bytes.split_at(RATE_BYTES);
            self.block.copy_from_slice(chunk);
            self.absorb_block();
            bytes = rest;
        }
        if !bytes.is_empty() {
            self.block[..bytes.len()].copy_from_slice(bytes);
            self.block_len = bytes.len();
        }
    }

    fn absorb_block(&mut self) {
        for (i, &byte) in self.block.iter().enumerate() {
            self.state.xor_byte(i, byte);
        }
        self.state.permute();
    }

    /// Finalize and return the 32-byte digest. Consumes `self` since Keccak
    /// padding is destructive to the buffered state.
    pub fn digest(mut self) -> [u8; OUTPUT_BYTES] {
        // Pad: domain suffix bit pattern, then 0s, then the final rate bit set.
        let mut padded = [0u8; RATE_BYTES];
        padded[..self.block_len].copy_from_slice(&self.block[..self.block_len]);
        padded[self.block_len] = DOMAIN_SUFFIX;
        padded[RATE_BYTES - 1] |= 0x80;
        for (i, &byte) in padded.iter().enumerate() {
            self.state.xor_byte(i, byte);
        }
        self.state.permute();

        let mut output = [0u8; OUTPUT_BYTES];
        let mut produced = 0;
        'squeeze: loop {
            for lane_index in 0..(RATE_BYTES / 8) {
                let x = lane_index % 5;
                let y = lane_index / 5;
                let lane = self.state.0[x][y];
                for byte_in_lane in 0..8 {
                    if produced == OUTPUT_BYTES {
                        break 'squeeze;
                    }
                    output[produced] = (lane >> (byte_in_lane * 8)) as u8;
                    produced += 1;
                }
            }
            self.state.permute();
        }
        output
    }

    /// One-shot digest over a buffer already held in memory.
    pub fn digest_oneshot(bytes: &[u8]) -> [u8; OUTPUT_BYTES] {
        let mut hasher = Self::new();
        hasher.update(bytes);
        hasher.digest()
    }
}

impl Default for Sha3_256 {
    fn default() -> Self {
        Self::new()
    }
}

/// Render a digest as lowercase hex, matching the wire format ELCL uses in
/// `@signature` lines and signer callbacks.
pub fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        write!(out, "{byte:02x}").expect("writing to a String never fails");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_matches_fips202_vector() {
        let digest = Sha3_256::digest_oneshot(b"");
        assert_eq!(to_hex(&digest), "a7ffc6f8bf1ed76651c14756a061d662f580ff4de43b49fa82d80a4b80f8434a");
    }

    #[test]
    fn streaming_matches_one_shot() {
        let data = b"the quick brown fox jumps over the lazy dog, repeatedly, to fill more than one block of input";
        let mut streamed = Sha3_256::new();
        for chunk in data.chunks(7) {
            streamed.update(chunk);
        }
        assert_eq!(streamed.digest(), Sha3_256::digest_oneshot(data));
    }

    #[test]
    fn exact_block_boundary_input() {
        let data = vec![0x61u8; RATE_BYTES];
        let mut streamed = Sha3_256::new();
        streamed.update(&data);
        let direct = Sha3_256::digest_oneshot(&data);
        assert_eq!(streamed.digest(), direct);
    }
}
