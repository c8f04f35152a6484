//! Cooperative cancellation flags and percentage progress reporting for response streams.

// std
use std::sync::atomic::{AtomicBool, Ordering};
// self
use crate::_prelude::*;

/// Callback receiving the percentage (0-100) of the response body read so far.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// Shared flag a running response read polls on every chunk.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);
impl CancellationToken {
	/// Creates an unset token.
	pub fn new() -> Self {
		Self::default()
	}

	/// Requests cancellation; reads observing the token abort at their next chunk.
	pub fn cancel(&self) {
		self.0.store(true, Ordering::Release);
	}

	/// Returns `true` once [`cancel`](Self::cancel) was called.
	pub fn is_cancelled(&self) -> bool {
		self.0.load(Ordering::Acquire)
	}

	fn is_orphaned(&self) -> bool {
		Arc::strong_count(&self.0) == 1
	}
}

/// Tokens keyed by a caller-chosen identifier such as a file id.
///
/// Entries whose every caller-side clone was dropped are pruned on the next
/// [`register`](Self::register) or [`cancel`](Self::cancel), so forgetting to
/// [`release`](Self::release) an id does not leak.
#[derive(Debug, Default)]
pub struct CancellationRegistry(Mutex<HashMap<String, CancellationToken>>);
impl CancellationRegistry {
	/// Returns the token registered for `id`, creating one when absent.
	pub fn register(&self, id: impl Into<String>) -> CancellationToken {
		let mut tokens = self.0.lock();

		tokens.retain(|_, token| !token.is_orphaned());
		tokens.entry(id.into()).or_default().clone()
	}

	/// Cancels the token registered for `id`; returns `false` when nothing is registered.
	pub fn cancel(&self, id: &str) -> bool {
		let mut tokens = self.0.lock();

		tokens.retain(|_, token| !token.is_orphaned());

		match tokens.get(id) {
			Some(token) => {
				token.cancel();

				true
			},
			None => false,
		}
	}

	/// Drops the registration for `id` once its transfer finished.
	pub fn release(&self, id: &str) -> Option<CancellationToken> {
		self.0.lock().remove(id)
	}

	/// Returns `true` while `id` is registered.
	pub fn contains(&self, id: &str) -> bool {
		self.0.lock().contains_key(id)
	}
}

/// Tracks consumed bytes and reports percentage changes to the callback.
pub(crate) struct ProgressTracker<'a> {
	callback: Option<&'a ProgressFn>,
	total: Option<u64>,
	read: u64,
	last: Option<u8>,
}
impl<'a> ProgressTracker<'a> {
	pub(crate) fn new(callback: Option<&'a ProgressFn>, total: Option<u64>) -> Self {
		Self { callback, total: total.filter(|total| *total > 0), read: 0, last: None }
	}

	pub(crate) fn advance(&mut self, bytes: usize) {
		self.read += bytes as u64;

		let (Some(callback), Some(total)) = (self.callback, self.total) else {
			return;
		};
		let percent = ((self.read.min(total) * 100) / total) as u8;

		if self.last != Some(percent) {
			self.last = Some(percent);

			callback(percent);
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn registry_cancels_registered_tokens() {
		let registry = CancellationRegistry::default();
		let token = registry.register("file-1");

		assert!(!token.is_cancelled());
		assert!(registry.cancel("file-1"));
		assert!(token.is_cancelled());
		assert!(!registry.cancel("file-2"));
		assert!(registry.release("file-1").is_some());
		assert!(!registry.contains("file-1"));
	}

	#[test]
	fn registry_prunes_tokens_nobody_holds() {
		let registry = CancellationRegistry::default();
		let kept = registry.register("file-1");

		drop(registry.register("file-2"));

		assert!(registry.contains("file-2"));

		let _other = registry.register("file-3");

		assert!(!registry.contains("file-2"));
		assert!(registry.contains("file-1"));
		assert!(!registry.cancel("file-2"));
		assert!(registry.cancel("file-1"));
		assert!(kept.is_cancelled());
	}

	#[test]
	fn tracker_reports_each_percentage_once() {
		let seen = Arc::new(Mutex::new(Vec::new()));
		let sink = seen.clone();
		let callback: ProgressFn = Arc::new(move |percent| sink.lock().push(percent));
		let mut tracker = ProgressTracker::new(Some(&callback), Some(200));

		tracker.advance(1);
		tracker.advance(1);
		tracker.advance(98);
		tracker.advance(100);

		assert_eq!(*seen.lock(), vec![0, 1, 50, 100]);
	}

	#[test]
	fn tracker_is_silent_without_content_length() {
		let seen = Arc::new(Mutex::new(Vec::<u8>::new()));
		let sink = seen.clone();
		let callback: ProgressFn = Arc::new(move |percent| sink.lock().push(percent));
		let mut tracker = ProgressTracker::new(Some(&callback), Some(0));

		tracker.advance(10);

		assert!(seen.lock().is_empty());
	}
}
