//! Request tokens used to detect superseded calls.

use tokio_util::sync::CancellationToken;

/// Handle for one call attempt.
///
/// The generation number is the token's identity: a call may only apply its
/// result while its generation is still the current one. The cancellation
/// token is the cooperative abort signal handed to the underlying call.
#[derive(Debug, Clone)]
pub struct RequestToken {
  generation: u64,
  cancellation: CancellationToken,
}

impl RequestToken {
  pub fn generation(&self) -> u64 {
    self.generation
  }

  /// The abort signal for this call. Cancelled when the call is superseded
  /// or its fetcher is dropped.
  pub fn cancellation(&self) -> CancellationToken {
    self.cancellation.clone()
  }
}

/// Tracks which token is current for a single fetcher.
#[derive(Debug, Default)]
pub struct TokenSlot {
  next_generation: u64,
  current: Option<RequestToken>,
}

impl TokenSlot {
  /// Mint a new token and make it current, cancelling the previous one.
  pub fn mint(&mut self) -> RequestToken {
    self.invalidate();
    self.next_generation += 1;
    let token = RequestToken {
      generation: self.next_generation,
      cancellation: CancellationToken::new(),
    };
    self.current = Some(token.clone());
    token
  }

  pub fn is_current(&self, token: &RequestToken) -> bool {
    self
      .current
      .as_ref()
      .is_some_and(|current| current.generation == token.generation)
  }

  /// Release the token of a call that settled. Returns false if the token
  /// was no longer current.
  pub fn finish(&mut self, token: &RequestToken) -> bool {
    if self.is_current(token) {
      self.current = None;
      true
    } else {
      false
    }
  }

  /// Cancel the current token, if any, without minting a replacement.
  pub fn invalidate(&mut self) -> bool {
    match self.current.take() {
      Some(previous) => {
        previous.cancellation.cancel();
        true
      }
      None => false,
    }
  }
}
