//! Signal view
//!
//! Borrowed, read-only view of a decoded audio signal. Decoding happens
//! upstream; every detector takes a `&SignalView` and never copies the
//! caller's buffers unless a multichannel mixdown is required.

use std::borrow::Cow;

use crate::error::{AnalysisError, Result};

/// Per-channel sample buffers plus the rate they were sampled at.
///
/// A view with no channels stands for an absent signal and is rejected by
/// [`SignalView::validate`].
#[derive(Debug, Clone, PartialEq)]
pub struct SignalView<'a> {
    channels: Vec<&'a [f32]>,
    sample_rate: u32,
}

impl<'a> SignalView<'a> {
    /// Wrap one slice per channel.
    pub fn new(channels: Vec<&'a [f32]>, sample_rate: u32) -> Self {
        SignalView {
            channels,
            sample_rate,
        }
    }

    /// Wrap a single mono buffer.
    pub fn mono(samples: &'a [f32], sample_rate: u32) -> Self {
        Self::new(vec![samples], sample_rate)
    }

    /// Borrowed channel buffers.
    pub fn channels(&self) -> &[&'a [f32]] {
        &self.channels
    }

    /// Number of channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Samples per channel (0 for an absent signal).
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, |c| c.len())
    }

    /// True when there is nothing to analyse.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Duration in seconds, or 0.0 when the sample rate is zero.
    pub fn duration(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f32 / self.sample_rate as f32
    }

    /// Reject signals no detector can work on.
    ///
    /// Runs before any numeric work: absent (no channels), zero length,
    /// zero sample rate and channels of differing length all fail with
    /// [`AnalysisError::InvalidInput`].
    pub fn validate(&self) -> Result<()> {
        if self.channels.is_empty() {
            return Err(AnalysisError::InvalidInput("signal has no channels".into()));
        }
        if self.sample_rate == 0 {
            return Err(AnalysisError::InvalidInput(
                "sample rate must be positive".into(),
            ));
        }
        let len = self.len();
        if len == 0 {
            return Err(AnalysisError::InvalidInput("signal is empty".into()));
        }
        if let Some((idx, ch)) = self
            .channels
            .iter()
            .enumerate()
            .find(|(_, c)| c.len() != len)
        {
            return Err(AnalysisError::InvalidInput(format!(
                "channel {idx} has {} samples, expected {len}",
                ch.len()
            )));
        }
        Ok(())
    }

    /// Average all channels into one buffer. Mono input is borrowed as is.
    pub fn mixdown(&self) -> Cow<'a, [f32]> {
        match self.channels.as_slice() {
            [] => Cow::Borrowed(&[]),
            [only] => Cow::Borrowed(*only),
            many => {
                let scale = 1.0 / many.len() as f32;
                let mixed = (0..self.len())
                    .map(|i| many.iter().map(|c| c[i]).sum::<f32>() * scale)
                    .collect();
                Cow::Owned(mixed)
            }
        }
    }
}
