// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image buffer store — owns decoded pixel buffers behind opaque handles.
//
// The map from handle to buffer is the only shared state in the pipeline.
// Buffers are reference-counted so pixel work never runs under the lock, and
// released buffers are dropped only after the lock guard is gone.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use image::DynamicImage;
use pagewerk_core::error::{PagewerkError, Result};
use pagewerk_core::{ImageHandle, OutputFormat, Size};
use tracing::{debug, instrument, trace};

use crate::image::processor::{ImageProcessor, encode_image};

/// Registry of live image buffers keyed by handle.
#[derive(Default)]
pub struct ImageStore {
    slots: Mutex<HashMap<ImageHandle, Arc<DynamicImage>>>,
}

impl ImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience for the common case of several pipelines sharing a store.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<ImageHandle, Arc<DynamicImage>>> {
        // A panic while holding the lock cannot leave the map half-updated:
        // every critical section is a single insert, get, or remove.
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -- Creation -------------------------------------------------------------

    /// Take ownership of an image and return its handle. The image is
    /// normalised to 8-bit gray, RGB, or RGBA.
    pub fn insert(&self, image: DynamicImage) -> ImageHandle {
        let image = ImageProcessor::from_dynamic(image).normalized().into_dynamic();
        let handle = ImageHandle::new();
        trace!(%handle, width = image.width(), height = image.height(), "Buffer stored");
        self.slots().insert(handle, Arc::new(image));
        handle
    }

    /// Decode JPEG/PNG (or any format the `image` crate reads) into a new buffer.
    #[instrument(skip(self, bytes), fields(bytes_len = bytes.len()))]
    pub fn decode(&self, bytes: &[u8]) -> Result<ImageHandle> {
        let image = ImageProcessor::from_bytes(bytes)?.into_dynamic();
        Ok(self.insert(image))
    }

    /// Read and decode an image file.
    pub fn decode_file(&self, path: impl AsRef<std::path::Path>) -> Result<ImageHandle> {
        let image = ImageProcessor::open(path)?.into_dynamic();
        Ok(self.insert(image))
    }

    // -- Access ---------------------------------------------------------------

    /// Shared reference to a live buffer.
    pub fn get(&self, handle: ImageHandle) -> Result<Arc<DynamicImage>> {
        self.slots()
            .get(&handle)
            .cloned()
            .ok_or(PagewerkError::InvalidHandle(handle))
    }

    pub fn dimensions(&self, handle: ImageHandle) -> Result<Size> {
        let image = self.get(handle)?;
        Ok(Size::new(image.width(), image.height()))
    }

    /// Number of color channels (1, 3, or 4).
    pub fn channels(&self, handle: ImageHandle) -> Result<u8> {
        Ok(self.get(handle)?.color().channel_count())
    }

    pub fn contains(&self, handle: ImageHandle) -> bool {
        self.slots().contains_key(&handle)
    }

    /// Number of live buffers.
    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots().is_empty()
    }

    /// Encode a live buffer as JPEG or PNG.
    #[instrument(skip(self), fields(%handle))]
    pub fn encode(&self, handle: ImageHandle, format: OutputFormat) -> Result<Vec<u8>> {
        let image = self.get(handle)?;
        let bytes = encode_image(&image, format)?;
        debug!(bytes = bytes.len(), format = format.extension(), "Buffer encoded");
        Ok(bytes)
    }

    // -- Release --------------------------------------------------------------

    /// Drop the buffer behind `handle`.
    ///
    /// Idempotent: releasing an unknown or already-released handle does
    /// nothing. The buffer is freed after the lock is released.
    pub fn release(&self, handle: ImageHandle) {
        let removed = self.slots().remove(&handle);
        match removed {
            Some(image) => {
                trace!(%handle, "Buffer released");
                drop(image);
            }
            None => debug!(%handle, "Release of unknown or already-released handle ignored"),
        }
    }

    /// Tie `handle` to a guard that releases it when dropped.
    pub fn scoped(&self, handle: ImageHandle) -> ScopedHandle<'_> {
        ScopedHandle {
            store: self,
            handle,
            armed: true,
        }
    }
}

/// Releases its handle back to the store on drop, on success and error paths
/// alike.
pub struct ScopedHandle<'a> {
    store: &'a ImageStore,
    handle: ImageHandle,
    armed: bool,
}

impl ScopedHandle<'_> {
    pub fn handle(&self) -> ImageHandle {
        self.handle
    }

    /// Disarm the guard and hand ownership of the handle to the caller.
    pub fn into_inner(mut self) -> ImageHandle {
        self.armed = false;
        self.handle
    }
}

impl Drop for ScopedHandle<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.store.release(self.handle);
        }
    }
}

impl std::fmt::Debug for ScopedHandle<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedHandle")
            .field("handle", &self.handle)
            .field("armed", &self.armed)
            .finish()
    }
}
