//! Cross-source join keys.

use std::collections::HashMap;

/// Device join key: the serial number, trimmed and upper-cased.
pub fn device_join_key(serial_number: Option<&str>) -> Option<String> {
    serial_number
        .map(str::trim)
        .filter(|serial| !serial.is_empty())
        .map(str::to_uppercase)
}

/// Person join key: the email, trimmed and lower-cased.
pub fn person_join_key(email: Option<&str>) -> Option<String> {
    email
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .map(str::to_lowercase)
}

/// Map from join key to the last source record seen with that key.
#[derive(Debug, Clone)]
pub struct JoinIndex<T> {
    entries: HashMap<String, T>,
    missing_key: usize,
}

impl<T> Default for JoinIndex<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            missing_key: 0,
        }
    }
}

impl<T> JoinIndex<T> {
    /// Indexes `records` in one pass. Later records overwrite earlier ones
    /// with the same key; records without a key are only counted.
    pub fn build<I, F>(records: I, key_of: F) -> Self
    where
        I: IntoIterator<Item = T>,
        F: Fn(&T) -> Option<String>,
    {
        let mut index = Self::default();
        index.extend(records, key_of);
        index
    }

    /// Adds another page of records with the same overwrite rule.
    pub fn extend<I, F>(&mut self, records: I, key_of: F)
    where
        I: IntoIterator<Item = T>,
        F: Fn(&T) -> Option<String>,
    {
        for record in records {
            match key_of(&record) {
                Some(key) => {
                    self.entries.insert(key, record);
                }
                None => self.missing_key += 1,
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.entries.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<T> {
        self.entries.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records that could not be indexed for lack of a key.
    pub fn missing_key(&self) -> usize {
        self.missing_key
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn into_entries(self) -> HashMap<String, T> {
        self.entries
    }
}
