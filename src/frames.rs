//! Frame extraction
//!
//! Fixed-size, optionally overlapping analysis frames over a mono buffer.
//! The last frame is zero-padded so trailing samples are never dropped.

use std::borrow::Cow;

use crate::error::{AnalysisError, Result};

/// Describes how a buffer is cut into frames. Cheap to copy; every call to
/// [`FrameExtractor::frames`] starts a new pass from the beginning.
#[derive(Debug, Clone, Copy)]
pub struct FrameExtractor<'a> {
    samples: &'a [f32],
    frame_size: usize,
    hop_size: usize,
}

impl<'a> FrameExtractor<'a> {
    /// Prepare frames of `frame_size` samples every `hop_size` samples.
    ///
    /// Fails with [`AnalysisError::InsufficientSignal`] when `samples` cannot
    /// fill a single frame.
    pub fn new(samples: &'a [f32], frame_size: usize, hop_size: usize) -> Result<Self> {
        if frame_size == 0 {
            return Err(AnalysisError::Configuration("frame_size cannot be zero".into()));
        }
        if hop_size == 0 {
            return Err(AnalysisError::Configuration("hop_size cannot be zero".into()));
        }
        if samples.len() < frame_size {
            return Err(AnalysisError::InsufficientSignal {
                required: frame_size,
                available: samples.len(),
            });
        }
        Ok(FrameExtractor {
            samples,
            frame_size,
            hop_size,
        })
    }

    /// Number of frames, including the zero-padded tail.
    pub fn len(&self) -> usize {
        let rest = self.samples.len() - self.frame_size;
        1 + rest.div_ceil(self.hop_size)
    }

    /// Always false: construction guarantees at least one frame.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Samples per frame.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Distance between consecutive frame starts.
    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    /// Sample offset where frame `index` begins.
    pub fn frame_start(&self, index: usize) -> usize {
        index * self.hop_size
    }

    /// Start of frame `index` in seconds.
    pub fn frame_time(&self, index: usize, sample_rate: u32) -> f32 {
        self.frame_start(index) as f32 / sample_rate as f32
    }

    /// Iterate over all frames from the start of the buffer.
    pub fn frames(&self) -> Frames<'a> {
        Frames {
            extractor: *self,
            next: 0,
            count: self.len(),
        }
    }
}

/// Iterator returned by [`FrameExtractor::frames`].
///
/// Full frames borrow the caller's buffer; only the padded tail allocates.
#[derive(Debug, Clone)]
pub struct Frames<'a> {
    extractor: FrameExtractor<'a>,
    next: usize,
    count: usize,
}

impl<'a> Iterator for Frames<'a> {
    type Item = Cow<'a, [f32]>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.count {
            return None;
        }
        let FrameExtractor {
            samples,
            frame_size,
            ..
        } = self.extractor;
        let start = self.extractor.frame_start(self.next);
        self.next += 1;

        let end = start + frame_size;
        if end <= samples.len() {
            return Some(Cow::Borrowed(&samples[start..end]));
        }
        let mut padded = vec![0.0; frame_size];
        let available = &samples[start.min(samples.len())..];
        padded[..available.len()].copy_from_slice(available);
        Some(Cow::Owned(padded))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.count - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Frames<'_> {}
