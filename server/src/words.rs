//! Word rotation for the vote stations and the append-only word log.
//!
//! Each station shows two words, one per pad. Words rotate on a timer; a
//! freshly posted word only appears on the dashboards after a delay, so a
//! touch arriving before then still counts for the word it replaced.

use crate::config::HubConfig;
use crate::error::WordError;
use blinker_shared::color::Rgb;
use blinker_shared::protocol::{Choice, DataMsg, TouchFlavor};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Word {
    pub word: String,
    pub color: Rgb,
}

impl Word {
    pub fn new(word: &str, color: Rgb) -> Self {
        Self {
            word: word.to_string(),
            color,
        }
    }
}

pub fn default_word_pool() -> Vec<Word> {
    vec![
        Word::new("analytical", Rgb::new(0xc90, 0x910, 0xd30)),
        Word::new("inquisitive", Rgb::new(0xc86, 0x4b0, 0xff0)),
        Word::new("fearless", Rgb::new(0xea0, 0x300, 0x400)),
        Word::new("open-minded", Rgb::new(0xf60, 0xe90, 0x370)),
        Word::new("creative", Rgb::new(0xff0, 0xaa0, 0x110)),
        Word::new("balanced", Rgb::new(0x220, 0xaa0, 0xdd0)),
        Word::new("experiential", Rgb::new(0x990, 0xbb0, 0xee0)),
        Word::new("adventurous", Rgb::new(0xff0, 0x550, 0x330)),
        Word::new("inclusive", Rgb::new(0xd90, 0x480, 0xd60)),
        Word::new("present", Rgb::new(0x000, 0xff0, 0x880)),
        Word::new("disruptive", Rgb::new(0xff0, 0x8d0, 0x8d0)),
        Word::new("thoughtful", Rgb::new(0x8f0, 0x310, 0x9a0)),
        Word::new("curious", Rgb::new(0x5c0, 0x330, 0xfb0)),
        Word::new("critical", Rgb::new(0x2c0, 0xfc0, 0xfd0)),
    ]
}

/// One line of the word log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordLogRecord {
    pub word: String,
    /// `post`, `start_touch` or `end_touch`
    pub flavor: String,
    pub source: u32,
    pub choice: Choice,
    /// Unix time in milliseconds
    pub time: u64,
}

/// Current unix time in milliseconds
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

pub struct WordRotation {
    stations: Vec<u32>,
    pool: Vec<Word>,
    current: Vec<Word>,
    previous: Vec<Word>,
    /// Time each slot's current word becomes visible
    stamps: Vec<u64>,
    post_delay_ms: u64,
    rng: ChaCha8Rng,
    log: Box<dyn Write + Send>,
}

impl WordRotation {
    /// Fill every slot with a distinct word and log the initial posts.
    pub fn new(config: &HubConfig, log: Box<dyn Write + Send>, now: u64) -> Self {
        let slots = config.stations.len() * 2;
        let mut rotation = Self {
            stations: config.stations.clone(),
            pool: config.word_pool.clone(),
            current: Vec::with_capacity(slots),
            previous: Vec::with_capacity(slots),
            stamps: vec![now; slots],
            post_delay_ms: config.post_delay_ms,
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
            log,
        };
        for slot in 0..slots {
            let word = rotation.pick_word();
            rotation.current.push(word.clone());
            rotation.previous.push(word.clone());
            rotation.log_post(slot, &word.word, now);
        }
        rotation
    }

    /// Random pool word that is not displayed on any slot.
    fn pick_word(&mut self) -> Word {
        let candidates: Vec<&Word> = self
            .pool
            .iter()
            .filter(|w| !self.current.iter().any(|c| c.word == w.word))
            .collect();
        candidates
            .choose(&mut self.rng)
            .map(|w| (*w).clone())
            .or_else(|| self.pool.choose(&mut self.rng).cloned())
            .unwrap_or_default()
    }

    /// Replace the word on a random slot. The new word is stamped
    /// `post_delay` into the future.
    pub fn cycle_word(&mut self, now: u64) -> DataMsg {
        let slot = rand::Rng::gen_range(&mut self.rng, 0..self.current.len());
        let word = self.pick_word();
        let stamp = now + self.post_delay_ms;

        self.previous[slot] = std::mem::replace(&mut self.current[slot], word.clone());
        self.stamps[slot] = stamp;
        self.log_post(slot, &word.word, stamp);

        let (station, choice) = self.station_of(slot);
        DataMsg::new_word(station, choice, &word.word, word.color)
    }

    /// Log a touch and return the word it counts for.
    pub fn log_touch(
        &mut self,
        station: u32,
        flavor: TouchFlavor,
        choice: Option<Choice>,
        now: u64,
    ) -> Result<Word, WordError> {
        let choice = choice.ok_or(WordError::MissingChoice(station))?;
        let slot = self
            .slot(station, choice)
            .ok_or_else(|| WordError::UnknownStation {
                station,
                choice: choice.as_str().to_string(),
            })?;

        let word = if now < self.stamps[slot] {
            self.previous[slot].clone()
        } else {
            self.current[slot].clone()
        };

        let flavor = match flavor {
            TouchFlavor::StartTouch => "start_touch",
            TouchFlavor::EndTouch => "end_touch",
            TouchFlavor::TouchBeat => "touch_beat",
        };
        self.write_record(&WordLogRecord {
            word: word.word.clone(),
            flavor: flavor.to_string(),
            source: station,
            choice,
            time: now,
        });
        Ok(word)
    }

    /// One `new_word` message per slot with the words on display.
    pub fn snapshot(&self) -> Vec<DataMsg> {
        self.current
            .iter()
            .enumerate()
            .map(|(slot, word)| {
                let (station, choice) = self.station_of(slot);
                DataMsg::new_word(station, choice, &word.word, word.color)
            })
            .collect()
    }

    pub fn stations(&self) -> &[u32] {
        &self.stations
    }

    pub fn current(&self) -> &[Word] {
        &self.current
    }

    pub fn slot(&self, station: u32, choice: Choice) -> Option<usize> {
        let i = self.stations.iter().position(|&s| s == station)?;
        Some(match choice {
            Choice::Left => 2 * i,
            Choice::Right => 2 * i + 1,
        })
    }

    pub fn station_of(&self, slot: usize) -> (u32, Choice) {
        let choice = if slot % 2 == 0 {
            Choice::Left
        } else {
            Choice::Right
        };
        (self.stations[slot / 2], choice)
    }

    fn log_post(&mut self, slot: usize, word: &str, stamp: u64) {
        let (station, choice) = self.station_of(slot);
        self.write_record(&WordLogRecord {
            word: word.to_string(),
            flavor: "post".to_string(),
            source: station,
            choice,
            time: stamp,
        });
    }

    fn write_record(&mut self, record: &WordLogRecord) {
        let result = serde_json::to_writer(&mut self.log, record)
            .map_err(std::io::Error::from)
            .and_then(|_| self.log.write_all(b"\n"))
            .and_then(|_| self.log.flush());
        if let Err(e) = result {
            tracing::error!("Failed to write word log: {}", e);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    /// In-memory log sink that tests can read back.
    #[derive(Clone, Default)]
    pub(crate) struct SharedLog(pub Arc<Mutex<Vec<u8>>>);

    impl Write for SharedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedLog {
        pub(crate) fn records(&self) -> Vec<WordLogRecord> {
            let data = self.0.lock().unwrap();
            String::from_utf8_lossy(&data)
                .lines()
                .map(|l| serde_json::from_str(l).unwrap())
                .collect()
        }
    }

    fn rotation(now: u64) -> (WordRotation, SharedLog) {
        let log = SharedLog::default();
        let rotation = WordRotation::new(&HubConfig::default(), Box::new(log.clone()), now);
        (rotation, log)
    }

    fn distinct(words: &[Word]) -> bool {
        let set: HashSet<_> = words.iter().map(|w| w.word.as_str()).collect();
        set.len() == words.len()
    }

    #[test]
    fn initial_words_are_distinct_and_posted() {
        let (rotation, log) = rotation(1000);
        assert_eq!(rotation.current().len(), 6);
        assert!(distinct(rotation.current()));

        let records = log.records();
        assert_eq!(records.len(), 6);
        assert!(records.iter().all(|r| r.flavor == "post" && r.time == 1000));
        assert_eq!(records[0].source, 101);
        assert_eq!(records[0].choice, Choice::Left);
        assert_eq!(records[5].source, 103);
        assert_eq!(records[5].choice, Choice::Right);
    }

    #[test]
    fn slot_mapping_round_trips() {
        let (rotation, _) = rotation(0);
        assert_eq!(rotation.slot(101, Choice::Left), Some(0));
        assert_eq!(rotation.slot(102, Choice::Right), Some(3));
        assert_eq!(rotation.station_of(3), (102, Choice::Right));
        assert_eq!(rotation.slot(104, Choice::Left), None);
    }

    #[test]
    fn cycling_keeps_words_distinct() {
        let (mut rotation, _) = rotation(0);
        for i in 0..50 {
            let msg = rotation.cycle_word(i * 1000);
            assert_eq!(msg.flavor, blinker_shared::protocol::DataFlavor::NewWord);
            assert!(msg.color.is_some());
            assert!(distinct(rotation.current()));
        }
    }

    #[test]
    fn touch_before_post_delay_counts_for_previous_word() {
        let (mut rotation, log) = rotation(0);
        let msg = rotation.cycle_word(5_000);
        let slot = rotation.slot(msg.source, msg.choice).unwrap();
        let old = rotation.previous[slot].clone();
        let new = rotation.current[slot].clone();
        assert_ne!(old, new);

        let early = rotation
            .log_touch(msg.source, TouchFlavor::EndTouch, Some(msg.choice), 14_999)
            .unwrap();
        assert_eq!(early, old);
        let late = rotation
            .log_touch(msg.source, TouchFlavor::EndTouch, Some(msg.choice), 15_000)
            .unwrap();
        assert_eq!(late, new);

        let records = log.records();
        let post = &records[6];
        assert_eq!(post.flavor, "post");
        assert_eq!(post.time, 15_000);
        assert_eq!(post.word, new.word);
        let touch = records.last().unwrap();
        assert_eq!(touch.flavor, "end_touch");
        assert_eq!(touch.word, new.word);
        assert_eq!(touch.time, 15_000);
    }

    #[test]
    fn touch_from_unknown_station_is_rejected() {
        let (mut rotation, log) = rotation(0);
        let err = rotation
            .log_touch(555, TouchFlavor::StartTouch, Some(Choice::Left), 1)
            .unwrap_err();
        assert!(matches!(err, WordError::UnknownStation { station: 555, .. }));
        let err = rotation
            .log_touch(101, TouchFlavor::StartTouch, None, 1)
            .unwrap_err();
        assert_eq!(err, WordError::MissingChoice(101));
        assert_eq!(log.records().len(), 6);
    }

    #[test]
    fn snapshot_lists_every_slot() {
        let (rotation, _) = rotation(0);
        let snapshot = rotation.snapshot();
        assert_eq!(snapshot.len(), 6);
        for (slot, msg) in snapshot.iter().enumerate() {
            assert_eq!(msg.word, rotation.current()[slot].word);
            assert_eq!((msg.source, msg.choice), rotation.station_of(slot));
        }
    }

    #[test]
    fn same_seed_same_words() {
        let (a, _) = rotation(0);
        let (b, _) = rotation(0);
        assert_eq!(a.current(), b.current());
    }
}
