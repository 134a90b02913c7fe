//! # Events Module
//!
//! Progress reporting for hosts that show what the detector is doing.
//!
//! ## Design
//! The pipeline emits events through a channel; any UI (CLI spinner,
//! mobile progress view) subscribes on the receiving end. Events are
//! informational only and never affect the result.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//!
//! std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         if let Event::Pipeline(PipelineEvent::StageChanged { stage }) = event {
//!             println!("{}...", stage);
//!         }
//!     }
//! });
//!
//! pipeline.detect_with_events(&first, &second, selection, sensitivity, &sender)?;
//! ```

mod channel;
mod types;

pub use channel::{null_sender, EventChannel, EventReceiver, EventSender};
pub use types::*;
