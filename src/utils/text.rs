//! Lyric text splitting
//!
//! Half-width runs (latin words, digits) stay together; each East Asian
//! character becomes its own word. Closing punctuation sticks to the word
//! before it, opening brackets to the word after.

use unicode_width::UnicodeWidthChar;

const LEFT_PARENTHESIS: &[char] = &['(', '[', '{', '（', '［', '｛', '「', '『', '【', '〈', '《'];

/// Full-width punctuation that closes or trails a word
const TRAILING_PUNCTUATION: &[char] = &[
    '、', '。', '，', '．', '！', '？', '：', '；', '」', '』', '）', '］', '｝', '】', '〉', '》',
    '…', '‥', '・', '～', '〜',
];

pub fn is_full_width(c: char) -> bool {
    c.width().map_or(false, |w| w > 1)
}

pub fn is_left_parenthesis(c: char) -> bool {
    LEFT_PARENTHESIS.contains(&c)
}

fn is_punctuation(c: char) -> bool {
    c.is_ascii_punctuation() || TRAILING_PUNCTUATION.contains(&c)
}

/// Split `text` into words; whitespace runs collapse into a single `" "` entry
pub fn split_words(text: &str) -> Vec<String> {
    let mut words: Vec<String> = Vec::new();
    let mut word = String::new();

    fn push_word(words: &mut Vec<String>, word: &mut String) {
        if !word.is_empty() {
            words.push(std::mem::take(word));
        }
    }

    for c in text.chars() {
        if c.is_whitespace() {
            push_word(&mut words, &mut word);
            if words.last().map(String::as_str) != Some(" ") {
                words.push(" ".to_string());
            }
            continue;
        }
        if is_left_parenthesis(c) {
            push_word(&mut words, &mut word);
            word.push(c);
            continue;
        }
        if is_punctuation(c) && word.is_empty() {
            if let Some(last) = words.last_mut().filter(|w| w.as_str() != " ") {
                last.push(c);
                continue;
            }
        }
        if !is_full_width(c) || is_punctuation(c) {
            word.push(c);
            continue;
        }
        // East Asian character: a word on its own, unless it follows an
        // opening bracket
        if word.chars().all(is_left_parenthesis) && !word.is_empty() {
            word.push(c);
            push_word(&mut words, &mut word);
            continue;
        }
        push_word(&mut words, &mut word);
        word.push(c);
        push_word(&mut words, &mut word);
    }
    push_word(&mut words, &mut word);
    words
}

/// Normalise free text into separator-delimited words, one line per line
pub fn split_lyrics(text: &str, separator: char) -> String {
    text.split(['\r', '\n'])
        .map(|line| {
            let cleaned: String = line.chars().filter(|c| *c != separator).collect();
            split_words(&cleaned).join(&separator.to_string())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_east_asian_characters_split() {
        assert_eq!(split_words("歌詞"), vec!["歌", "詞"]);
    }

    #[test]
    fn test_latin_words_stay_together() {
        assert_eq!(split_words("hello  world"), vec!["hello", " ", "world"]);
    }

    #[test]
    fn test_punctuation_and_brackets() {
        assert_eq!(split_words("君、(Hi)"), vec!["君、", "(Hi)"]);
        assert_eq!(split_words("「夢」"), vec!["「夢」"]);
    }

    #[test]
    fn test_split_lyrics_inserts_separator() {
        assert_eq!(split_lyrics("夢|見\nla la", '|'), "夢|見\nla| |la");
    }
}
