//! Natural ("human") string ordering.
//!
//! Digit runs compare by numeric value, so `item2` sorts before `item10`.
//! Leading zeros are ignored when comparing run values; when two strings
//! compare equal run by run, the shorter one sorts first.

use std::cmp::Ordering;

pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let (mut i, mut j) = (0, 0);

    while i < a_chars.len() && j < b_chars.len() {
        let (ca, cb) = (a_chars[i], b_chars[j]);

        if ca.is_ascii_digit() && cb.is_ascii_digit() {
            let (a_start, a_end) = digit_run(&a_chars, i);
            let (b_start, b_end) = digit_run(&b_chars, j);

            let by_len = (a_end - a_start).cmp(&(b_end - b_start));
            if by_len != Ordering::Equal {
                return by_len;
            }
            let by_digits = a_chars[a_start..a_end].cmp(&b_chars[b_start..b_end]);
            if by_digits != Ordering::Equal {
                return by_digits;
            }
            i = a_end;
            j = b_end;
            continue;
        }

        if ca != cb {
            return ca.cmp(&cb);
        }
        i += 1;
        j += 1;
    }

    match (i < a_chars.len(), j < b_chars.len()) {
        (false, true) => Ordering::Less,
        (true, false) => Ordering::Greater,
        _ => a_chars.len().cmp(&b_chars.len()),
    }
}

/// Returns `(significant_start, end)` of the digit run beginning at `start`.
fn digit_run(chars: &[char], start: usize) -> (usize, usize) {
    let mut end = start;
    while end < chars.len() && chars[end].is_ascii_digit() {
        end += 1;
    }
    let mut significant = start;
    while significant + 1 < end && chars[significant] == '0' {
        significant += 1;
    }
    (significant, end)
}

#[cfg(test)]
mod tests {
    use super::natural_cmp;
    use std::cmp::Ordering;

    #[test]
    fn digit_runs_compare_numerically() {
        let mut labels = vec!["item2", "item10", "item1"];
        labels.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(labels, vec!["item1", "item2", "item10"]);
    }

    #[test]
    fn leading_zeros_do_not_change_value() {
        assert_eq!(natural_cmp("a007", "a7b"), Ordering::Less);
        assert_eq!(natural_cmp("a007", "a7"), Ordering::Greater);
        assert_eq!(natural_cmp("x0", "x00"), Ordering::Less);
    }

    #[test]
    fn plain_text_compares_by_code_point() {
        assert_eq!(natural_cmp("apple", "banana"), Ordering::Less);
        assert_eq!(natural_cmp("same", "same"), Ordering::Equal);
        assert_eq!(natural_cmp("ab", "abc"), Ordering::Less);
        assert_eq!(natural_cmp("B", "a"), Ordering::Less);
    }

    #[test]
    fn digits_sort_before_letters() {
        assert_eq!(natural_cmp("9", "a"), Ordering::Less);
    }
}
