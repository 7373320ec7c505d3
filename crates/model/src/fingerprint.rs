use sha2::{Digest, Sha256};

/// Canonical shape string of a statement: string and numeric literals become
/// `?`, whitespace collapses to single spaces, everything is lowercased, and
/// ORDER BY direction tokens are dropped so `ASC`/`DESC` variants share one
/// shape.
pub fn normalize_shape(sql: &str) -> String {
    let mut masked = String::with_capacity(sql.len());
    let bytes = sql.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i] as char;
        if c == '\'' {
            // String literal with '' escaping.
            i += 1;
            while i < bytes.len() {
                if bytes[i] == b'\'' {
                    if i + 1 < bytes.len() && bytes[i + 1] == b'\'' {
                        i += 2;
                        continue;
                    }
                    i += 1;
                    break;
                }
                i += 1;
            }
            masked.push('?');
            continue;
        }
        if c.is_ascii_digit() && !prev_is_ident(&masked) {
            while i < bytes.len()
                && ((bytes[i] as char).is_ascii_digit() || bytes[i] == b'.')
            {
                i += 1;
            }
            masked.push('?');
            continue;
        }
        masked.push(c);
        i += 1;
    }

    let mut out = String::with_capacity(masked.len());
    for token in masked.split_whitespace() {
        let lowered = token.to_lowercase();
        if lowered == "asc" || lowered == "desc" {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&lowered);
    }
    out
}

fn prev_is_ident(s: &str) -> bool {
    s.chars()
        .last()
        .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Stable 64-bit fingerprint of the normalized shape.
///
/// First eight bytes (big-endian) of the SHA-256 digest, so the value does
/// not depend on process, platform, or standard-library hash seeds.
pub fn fingerprint(sql: &str) -> u64 {
    let shape = normalize_shape(sql);
    let digest = Sha256::digest(shape.as_bytes());
    u64::from_be_bytes(digest[..8].try_into().expect("sha256 digest length"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn literals_are_masked() {
        assert_eq!(
            normalize_shape("SELECT * FROM orders WHERE user_id = 42"),
            "select * from orders where user_id = ?"
        );
        assert_eq!(
            normalize_shape("SELECT * FROM t WHERE k = 'it''s'"),
            "select * from t where k = ?"
        );
    }

    #[test]
    fn digits_inside_identifiers_survive() {
        assert_eq!(
            normalize_shape("SELECT c1 FROM t2 WHERE c1 = 7"),
            "select c1 from t2 where c1 = ?"
        );
    }

    #[test]
    fn order_by_directions_are_omitted() {
        let a = fingerprint("SELECT id FROM t ORDER BY created_at ASC");
        let b = fingerprint("SELECT id FROM t ORDER BY created_at DESC");
        let c = fingerprint("SELECT id FROM t ORDER BY created_at");
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn same_shape_different_literals_collide() {
        let a = fingerprint("SELECT * FROM orders WHERE user_id = 1");
        let b = fingerprint("SELECT * FROM orders  WHERE user_id = 999");
        assert_eq!(a, b);
    }

    #[test]
    fn different_shapes_diverge() {
        let a = fingerprint("SELECT * FROM orders WHERE user_id = 1");
        let b = fingerprint("SELECT * FROM users WHERE user_id = 1");
        assert_ne!(a, b);
    }

    #[test]
    fn casing_of_unquoted_identifiers_is_normalized() {
        assert_eq!(
            fingerprint("SELECT * FROM Orders WHERE User_Id = 42"),
            fingerprint("select * from orders where user_id = 7")
        );
    }

    proptest! {
        #[test]
        fn whitespace_never_affects_fingerprint(n in 0u32..100_000) {
            let tight = format!("SELECT id FROM events WHERE tenant_id = {n}");
            let loose = format!("SELECT   id\n FROM\tevents   WHERE tenant_id =    {n}");
            prop_assert_eq!(fingerprint(&tight), fingerprint(&loose));
        }

        #[test]
        fn integer_literal_never_affects_fingerprint(a in 0u64..u64::MAX, b in 0u64..u64::MAX) {
            let qa = format!("SELECT * FROM orders WHERE user_id = {a}");
            let qb = format!("SELECT * FROM orders WHERE user_id = {b}");
            prop_assert_eq!(fingerprint(&qa), fingerprint(&qb));
        }
    }
}
