//! In-process provider fakes
//!
//! Every fake counts its calls so tests can assert that a cache hit or a
//! rejected paid action never reached the provider.

use async_trait::async_trait;
use libris_ai::models::Track;
use libris_ai::services::{BlobStore, GeneratedImage, ImageGenerator, MusicSearch, ProviderError, TextGenerator, TextPrompt};
use libris_ai::workflow::Providers;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Text provider answering from a script, then from a fallback
#[derive(Default)]
pub struct ScriptedText {
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
    fallback: Option<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedText {
    /// Answers every call with `text`
    pub fn always(text: &str) -> Self {
        Self {
            fallback: Some(text.to_string()),
            ..Default::default()
        }
    }

    /// Answers calls in order; further calls fail
    pub fn sequence(answers: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(answers.into()),
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedText {
    async fn generate(&self, prompt: &TextPrompt) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.user.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(next) = self.script.lock().unwrap().pop_front() {
            return next;
        }
        match &self.fallback {
            Some(text) => Ok(text.clone()),
            None => Err(ProviderError::api(500, "script exhausted")),
        }
    }
}

/// Image provider returning a fixed PNG header
#[derive(Default)]
pub struct FakeImages {
    calls: AtomicUsize,
}

impl FakeImages {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageGenerator for FakeImages {
    async fn generate_image(&self, _prompt: &str) -> Result<GeneratedImage, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(GeneratedImage {
            bytes: vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a],
            extension: "png",
        })
    }
}

/// Music search returning one track per call, named after the term
#[derive(Default)]
pub struct FakeMusic {
    fail: bool,
    calls: AtomicUsize,
}

impl FakeMusic {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MusicSearch for FakeMusic {
    async fn search_tracks(&self, term: &str, _limit: usize) -> Result<Vec<Track>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ProviderError::Network("connection refused".to_string()));
        }
        Ok(vec![Track {
            title: format!("{} theme", term),
            artist: "Test Ensemble".to_string(),
            preview_url: None,
            store_url: None,
        }])
    }
}

/// Blob store keeping bytes in memory
#[derive(Default)]
pub struct MemoryBlobs {
    blobs: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemoryBlobs {
    pub fn len(&self) -> usize {
        self.blobs.lock().unwrap().len()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobs {
    async fn put(&self, bytes: &[u8], extension: &str) -> libris_common::Result<String> {
        let mut blobs = self.blobs.lock().unwrap();
        let name = format!("blob-{}.{}", blobs.len(), extension);
        blobs.push((name.clone(), bytes.to_vec()));
        Ok(name)
    }
}

/// Fakes wired into a provider set, kept separately for call counting
pub struct FakeProviders {
    pub text: Arc<ScriptedText>,
    pub images: Arc<FakeImages>,
    pub music: Arc<FakeMusic>,
    pub blobs: Arc<MemoryBlobs>,
}

impl FakeProviders {
    pub fn with_text(text: ScriptedText) -> Self {
        Self {
            text: Arc::new(text),
            images: Arc::new(FakeImages::default()),
            music: Arc::new(FakeMusic::default()),
            blobs: Arc::new(MemoryBlobs::default()),
        }
    }

    pub fn providers(&self) -> Providers {
        Providers {
            text: self.text.clone(),
            images: self.images.clone(),
            music: self.music.clone(),
            blobs: self.blobs.clone(),
        }
    }
}
