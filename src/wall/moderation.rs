//! Optional caption moderation hook.
//!
//! The wall does not moderate captions itself. An external reviewer can be
//! plugged in; when it is absent every caption is accepted, and when it
//! fails the configured [`ModerationPolicy`] decides.

use async_trait::async_trait;
use tracing::warn;

use crate::error::{Error, Result};

/// Reviewer decision for one caption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject(String),
}

/// External caption reviewer.
#[async_trait]
pub trait CaptionModerator: Send + Sync + 'static {
    /// Reviews a caption.
    ///
    /// # Errors
    ///
    /// Returns an error when the reviewer could not reach a decision.
    async fn review(&self, caption: &str) -> anyhow::Result<Verdict>;
}

/// What to do when the reviewer fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModerationPolicy {
    /// Accept the submission when the reviewer errors.
    pub fail_open: bool,
}

impl Default for ModerationPolicy {
    fn default() -> Self {
        Self { fail_open: true }
    }
}

/// Applies the reviewer and policy to a caption.
///
/// # Errors
///
/// Returns [`Error::Validation`] when the caption is rejected, or when the
/// reviewer fails under a fail-closed policy.
pub async fn check_caption(
    moderator: Option<&dyn CaptionModerator>,
    policy: ModerationPolicy,
    caption: &str,
) -> Result<()> {
    let Some(moderator) = moderator else {
        return Ok(());
    };
    if caption.trim().is_empty() {
        return Ok(());
    }

    match moderator.review(caption).await {
        Ok(Verdict::Accept) => Ok(()),
        Ok(Verdict::Reject(reason)) => Err(Error::validation(format!("caption rejected: {reason}"))),
        Err(e) if policy.fail_open => {
            warn!(target: "wall", error = %e, "Caption review failed, accepting");
            Ok(())
        },
        Err(e) => {
            warn!(target: "wall", error = %e, "Caption review failed, rejecting");
            Err(Error::validation("caption could not be reviewed"))
        },
    }
}
