// Copyright 2025 Webmobix Solutions AG
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUTHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Bijective base-26 conversion between column indices and column letters.
//!
//! Two entry points exist on purpose: [`index_to_letters`] takes a zero-based
//! column index (`0 = A`), while [`count_to_letters`] takes a one-based column
//! count (`1 = A`) and is used when a range is sized from a number of columns.

/// Converts a zero-based column index to a column letter (0=A, 25=Z, 26=AA, ...).
pub fn index_to_letters(index: usize) -> String {
    let mut result = String::new();
    let mut n = index;

    loop {
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }

    result
}

/// Converts a one-based column count to the letters of the last column
/// (1=A, 26=Z, 27=AA, ...). A count of zero has no column and yields an
/// empty string.
pub fn count_to_letters(count: usize) -> String {
    let mut result = String::new();
    let mut n = count;

    while n > 0 {
        let digit = (n - 1) % 26;
        result.insert(0, (b'A' + digit as u8) as char);
        n = (n - 1) / 26;
    }

    result
}

/// Converts column letters back to a zero-based index. Lowercase letters are
/// accepted; anything else (including an empty string) yields `None`.
pub fn letters_to_index(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }

    let mut value: usize = 0;
    for ch in letters.chars() {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        let digit = (ch.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        value = value.checked_mul(26)?.checked_add(digit)?;
    }

    Some(value - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converts_single_and_double_letter_indices() {
        assert_eq!(index_to_letters(0), "A");
        assert_eq!(index_to_letters(25), "Z");
        assert_eq!(index_to_letters(26), "AA");
        assert_eq!(index_to_letters(51), "AZ");
        assert_eq!(index_to_letters(52), "BA");
        assert_eq!(index_to_letters(701), "ZZ");
        assert_eq!(index_to_letters(702), "AAA");
    }

    #[test]
    fn test_round_trips_every_column_from_a_to_zz() {
        for index in 0..=701 {
            let letters = index_to_letters(index);
            assert_eq!(letters_to_index(&letters), Some(index), "column {letters}");
        }
    }

    #[test]
    fn test_count_variant_is_shifted_by_one() {
        assert_eq!(count_to_letters(1), "A");
        assert_eq!(count_to_letters(26), "Z");
        assert_eq!(count_to_letters(27), "AA");
        assert_eq!(count_to_letters(702), "ZZ");
        assert_eq!(count_to_letters(0), "");

        for count in 1..=702 {
            assert_eq!(count_to_letters(count), index_to_letters(count - 1));
        }
    }

    #[test]
    fn test_rejects_invalid_letters() {
        assert_eq!(letters_to_index(""), None);
        assert_eq!(letters_to_index("A1"), None);
        assert_eq!(letters_to_index("aa"), Some(26));
    }
}
