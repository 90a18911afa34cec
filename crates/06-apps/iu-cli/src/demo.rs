//! Small concrete modules for the demo topologies.
//!
//! `recognizer` plays back an utterance word by word the way an incremental
//! speech recognizer would, occasionally emitting a wrong guess and revising
//! it a step later. `tracker` folds the word stream into one hypothesis unit
//! per change. `printer` writes every update it sees to stdout.

use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use iu::{Iu, Payload, PayloadType, Text, UpdateMessage, UpdateType};
use network::ModuleSpec;
use runtime::{Module, ModuleContext};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Constructor used by `Network::from_topology`.
pub fn build(spec: &ModuleSpec) -> Result<Box<dyn Module>> {
    let module: Box<dyn Module> = match spec.kind.as_str() {
        "recognizer" => Box::new(Recognizer::new(&spec.name, options(spec)?)),
        "tracker" => Box::new(HypothesisTracker::new(&spec.name)),
        "printer" => Box::new(Printer::new(&spec.name)),
        other => bail!("unknown module kind `{other}`"),
    };
    Ok(module)
}

fn options<T: DeserializeOwned + Default>(spec: &ModuleSpec) -> Result<T> {
    if spec.options.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(spec.options.clone())
        .with_context(|| format!("invalid options for `{}`", spec.name))
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RecognizerOptions {
    pub utterance: String,
    /// Every n-th word is first misheard, then revised. 0 disables revisions.
    pub revise_every: usize,
    /// Pause between emitted steps.
    pub delay_ms: u64,
}

impl Default for RecognizerOptions {
    fn default() -> Self {
        Self {
            utterance: "the quick brown fox jumps over the lazy dog".to_owned(),
            revise_every: 3,
            delay_ms: 20,
        }
    }
}

pub struct Recognizer {
    name: String,
    words: Vec<String>,
    revise_every: usize,
    delay: Duration,
    next: usize,
    last_step: Option<Instant>,
    /// Misheard unit waiting for its revision.
    guess: Option<Iu>,
    /// Last word that was not a guess.
    last_word: Option<Iu>,
}

impl Recognizer {
    pub fn new(name: &str, options: RecognizerOptions) -> Self {
        Self {
            name: name.to_owned(),
            words: options
                .utterance
                .split_whitespace()
                .map(str::to_owned)
                .collect(),
            revise_every: options.revise_every,
            delay: Duration::from_millis(options.delay_ms),
            next: 0,
            last_step: None,
            guess: None,
            last_word: None,
        }
    }

    fn due(&mut self) -> bool {
        let now = Instant::now();
        match self.last_step {
            Some(last) if now.duration_since(last) < self.delay => false,
            _ => {
                self.last_step = Some(now);
                true
            }
        }
    }

    fn word(&mut self, ctx: &ModuleContext) -> Iu {
        let mut builder = ctx.create_iu(Text::new(self.words[self.next].clone()));
        if let Some(last) = &self.last_word {
            builder = builder.previous(last);
        }
        let iu = builder.build();
        self.next += 1;
        self.last_word = Some(iu.clone());
        iu
    }
}

fn misheard(word: &str) -> String {
    let keep = (word.chars().count() / 2).max(1);
    let prefix: String = word.chars().take(keep).collect();
    format!("{prefix}?")
}

impl Module for Recognizer {
    fn name(&self) -> &str {
        &self.name
    }

    fn output_types(&self) -> Vec<PayloadType> {
        vec![Text::TYPE]
    }

    fn process_update(
        &mut self,
        _input: &str,
        _message: &UpdateMessage,
        _ctx: &mut ModuleContext,
    ) -> Result<Option<UpdateMessage>> {
        Ok(None)
    }

    fn produce(&mut self, ctx: &mut ModuleContext) -> Result<Option<UpdateMessage>> {
        if !self.due() {
            return Ok(None);
        }

        if let Some(guess) = self.guess.take() {
            tracing::debug!(guess = %guess.id(), "revising");
            let word = self.word(ctx);
            let mut message = UpdateMessage::from_iu(guess, UpdateType::Revoke)?;
            message.push(word, UpdateType::Add)?;
            return Ok(Some(message));
        }

        if self.next < self.words.len() {
            let revise = self.revise_every > 0 && (self.next + 1) % self.revise_every == 0;
            if revise {
                let guess = ctx
                    .create_iu(Text::new(misheard(&self.words[self.next])))
                    .build();
                self.guess = Some(guess.clone());
                return Ok(Some(UpdateMessage::from_iu(guess, UpdateType::Add)?));
            }
            let word = self.word(ctx);
            return Ok(Some(UpdateMessage::from_iu(word, UpdateType::Add)?));
        }

        let mut final_words: Vec<Iu> = ctx.active_outputs().cloned().collect();
        final_words.sort_by_key(Iu::id);
        ctx.finish();
        if final_words.is_empty() {
            return Ok(None);
        }
        tracing::debug!(words = final_words.len(), "committing utterance");
        Ok(Some(UpdateMessage::from_ius(final_words, UpdateType::Commit)?))
    }
}

/// Keeps the current word sequence and republishes it as a single
/// hypothesis whenever it changes, grounded in the words it spells out.
pub struct HypothesisTracker {
    name: String,
    words: Vec<Iu>,
    current: Option<Iu>,
}

impl HypothesisTracker {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            words: Vec::new(),
            current: None,
        }
    }

    fn text(&self) -> String {
        self.words
            .iter()
            .filter_map(|word| word.payload_as::<Text>())
            .map(|text| text.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Module for HypothesisTracker {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_types(&self) -> Vec<PayloadType> {
        vec![Text::TYPE]
    }

    fn output_types(&self) -> Vec<PayloadType> {
        vec![Text::TYPE]
    }

    fn process_update(
        &mut self,
        _input: &str,
        message: &UpdateMessage,
        ctx: &mut ModuleContext,
    ) -> Result<Option<UpdateMessage>> {
        let mut changed = false;
        for (iu, update) in message.iter() {
            match update {
                UpdateType::Add => {
                    self.words.push(iu.clone());
                    changed = true;
                }
                UpdateType::Revoke => {
                    self.words.retain(|word| word.id() != iu.id());
                    changed = true;
                }
                UpdateType::Commit => {}
            }
        }

        // A word can be revoked upstream before its REVOKE reaches us.
        self.words.retain(|word| !word.is_revoked());

        let mut out = UpdateMessage::new();
        if changed {
            if let Some(old) = self.current.take() {
                out.push(old, UpdateType::Revoke)?;
            }
            if !self.words.is_empty() {
                let hypothesis = ctx
                    .create_iu(Text::new(self.text()))
                    .grounded_in_all(&self.words)
                    .build();
                self.current = Some(hypothesis.clone());
                out.push(hypothesis, UpdateType::Add)?;
            }
        } else if self.words.iter().all(Iu::is_committed) {
            if let Some(current) = self.current.as_ref().filter(|iu| iu.is_active()) {
                out.push(current.clone(), UpdateType::Commit)?;
            }
        }

        Ok((!out.is_empty()).then_some(out))
    }
}

/// Writes `+ text`, `- text` and `= text` lines for ADD, REVOKE and COMMIT.
pub struct Printer {
    name: String,
}

impl Printer {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
        }
    }
}

impl Module for Printer {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_types(&self) -> Vec<PayloadType> {
        vec![PayloadType::ANY]
    }

    fn process_update(
        &mut self,
        input: &str,
        message: &UpdateMessage,
        _ctx: &mut ModuleContext,
    ) -> Result<Option<UpdateMessage>> {
        for (iu, update) in message.iter() {
            let mark = match update {
                UpdateType::Add => '+',
                UpdateType::Revoke => '-',
                UpdateType::Commit => '=',
            };
            match iu.payload_as::<Text>() {
                Some(text) => println!("[{}/{input}] {mark} {}", self.name, text.text),
                None => println!("[{}/{input}] {mark} {:?}", self.name, iu.payload()),
            }
        }
        Ok(None)
    }
}
