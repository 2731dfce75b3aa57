//! Remove the visible Gemini logo watermark from the bottom-right image corner.
//!
//! The generator stamps a semi-transparent logo at a fixed offset from the
//! bottom-right corner. This crate resolves where the logo sits from the image
//! dimensions alone, estimates per-pixel opacity, and blends the covered
//! pixels toward the surrounding border color. A [`ProcessingQueue`] drives
//! many images through the engine one at a time with progress accounting and
//! cooperative cancellation.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use gemini_watermark_remover::{WatermarkEngine, WatermarkRemover};
//!
//! let engine = WatermarkEngine::from_dir(Path::new("assets")).expect("failed to init engine");
//! let img = image::open("photo.png").unwrap().to_rgba8();
//! let cleaned = engine.remove_watermark(&img).unwrap();
//! cleaned.save("photo_no_watermark.png").unwrap();
//! ```
//!
//! # Batch processing
//!
//! ```no_run
//! use std::path::Path;
//! use gemini_watermark_remover::{ImageSource, ProcessingQueue, QueueOptions, WatermarkEngine};
//!
//! let engine = WatermarkEngine::from_dir(Path::new("assets")).unwrap();
//! let mut queue = ProcessingQueue::new(engine).with_options(QueueOptions {
//!     auto_process: false,
//!     ..QueueOptions::default()
//! });
//! queue.enqueue([ImageSource::from_path(Path::new("a.png")).unwrap()]);
//! queue.run_batch();
//! println!("{}% done", queue.progress().percentage);
//! ```

#![deny(missing_docs)]

pub mod alpha;
pub mod blending;
pub mod capture;
mod engine;
pub mod error;
pub mod geometry;
pub mod output;
pub mod queue;

pub use alpha::{AlphaMap, AlphaStrategy};
pub use capture::ReferenceCaptures;
pub use engine::{RemovalOptions, WatermarkEngine, WatermarkRemover};
pub use error::{Error, Result};
pub use geometry::{
    WatermarkConfig, WatermarkInfo, WatermarkProvider, WatermarkRect, WatermarkSize,
};
pub use output::{default_output_path, is_supported_image, save_image};
pub use queue::{
    BatchProgress, BatchState, CancelHandle, EntryStatus, ImageSource, ProcessingQueue,
    QueueEntry, QueueObserver, QueueOptions,
};
