//! Password digest for player authentication.
//!
//! A keyed byte-table scramble, salted with the (canonical) character
//! name and iterated, producing a fixed-width hex string that is stored
//! in the player row. Deterministic across platforms so player databases
//! move between hosts freely.

const SECRET: &[u8] = b"Ifhjf64hH8sa,-#39ddj843tvxcv0434dvsdc40G#34Trefc349534Y5#34trecerr943\
5#erZt#eA534#5erFtw#Trwec,9345mwrxm gerte-534lMIZDN(/dn8sfn8&DBDB/D&s\
8efnsd897)DDzD'D'D''Dofs,t0943-rg-gdfg-gdf.t,e95.34u.5retfrh.wretv.56\
9v4#asf.59m(D)/ND/DDLD;gd+dsa,fw9r,x  OD(98snfsf\0";

/// Scramble one 32-bit lane through the secret table.
fn mix(val: u32) -> u32 {
    let mut res: u32 = 0;
    res = res.wrapping_add(SECRET[(val & 255) as usize % SECRET.len()] as u32);
    res = res.wrapping_add((SECRET[((val >> 8) & 255) as usize % SECRET.len()] as u32) << 8);
    res = res.wrapping_add((SECRET[((val >> 16) & 255) as usize % SECRET.len()] as u32) << 16);
    res = res.wrapping_add((SECRET[((val >> 24) & 255) as usize % SECRET.len()] as u32) << 24);
    res ^ 0x5a7c_e52e
}

/// Digest `password` salted with `name`, yielding 32 hex characters.
pub fn hash_password(name: &str, password: &str) -> String {
    let mut lanes: [u32; 4] = [0x6a09_e667, 0xbb67_ae85, 0x3c6e_f372, 0xa54f_f53a];

    let mut feed = |byte: u8, round: usize| {
        let lane = round % 4;
        lanes[lane] = mix(lanes[lane] ^ ((byte as u32) << ((round % 3) * 8)));
        lanes[(lane + 1) % 4] = lanes[(lane + 1) % 4].rotate_left(7) ^ lanes[lane];
    };

    let mut round = 0usize;
    for b in name.to_lowercase().bytes().chain([0u8]).chain(password.bytes()) {
        feed(b, round);
        round += 1;
    }
    // Extra stirring rounds so short passwords don't leave lanes cold.
    for _ in 0..16 {
        feed(0x5a, round);
        round += 1;
    }

    lanes.iter().map(|l| format!("{:08x}", l)).collect()
}

/// Constant-shape comparison of a candidate password against a stored
/// digest.
pub fn verify_password(name: &str, password: &str, stored: &str) -> bool {
    let candidate = hash_password(name, password);
    if candidate.len() != stored.len() {
        return false;
    }
    candidate
        .bytes()
        .zip(stored.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        assert_eq!(
            hash_password("Bob", "hunter22"),
            hash_password("Bob", "hunter22")
        );
    }

    #[test]
    fn name_salt_separates_players() {
        assert_ne!(
            hash_password("Bob", "hunter22"),
            hash_password("Alice", "hunter22")
        );
    }

    #[test]
    fn salt_is_case_insensitive() {
        // Names are canonicalized on login; the digest must not care.
        assert_eq!(
            hash_password("BOB", "hunter22"),
            hash_password("bob", "hunter22")
        );
    }

    #[test]
    fn verify_round_trip() {
        let stored = hash_password("Bob", "hunter22");
        assert!(verify_password("Bob", "hunter22", &stored));
        assert!(!verify_password("Bob", "hunter23", &stored));
        assert!(!verify_password("Bob", "", &stored));
    }

    #[test]
    fn digest_is_32_hex_chars() {
        let d = hash_password("Bob", "x");
        assert_eq!(d.len(), 32);
        assert!(d.bytes().all(|b| b.is_ascii_hexdigit()));
    }
}
