//! The URL host a router reflects committed transitions into.

use crate::error::TransitionError;
use parking_lot::Mutex;

/// Where committed URLs go (browser history, a test double, ...).
///
/// A host that implements neither method fails every URL update.
pub trait UrlHost: Send + Sync {
    fn update_url(&self, _url: &str) -> Result<(), TransitionError> {
        Err(TransitionError::UrlHostUnimplemented {
            method: "update_url",
        })
    }

    fn replace_url(&self, url: &str) -> Result<(), TransitionError> {
        self.update_url(url)
    }
}

/// Host with no URL support. Any URL update fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoUrlHost;

impl UrlHost for NoUrlHost {}

/// In-memory history stack.
#[derive(Debug, Default)]
pub struct MemoryUrlHost {
    entries: Mutex<Vec<String>>,
}

impl MemoryUrlHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<String> {
        self.entries.lock().last().cloned()
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }
}

impl UrlHost for MemoryUrlHost {
    fn update_url(&self, url: &str) -> Result<(), TransitionError> {
        self.entries.lock().push(url.to_owned());
        Ok(())
    }

    fn replace_url(&self, url: &str) -> Result<(), TransitionError> {
        let mut entries = self.entries.lock();
        match entries.last_mut() {
            Some(last) => *last = url.to_owned(),
            None => entries.push(url.to_owned()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unimplemented_host_fails_loudly() {
        assert_eq!(
            NoUrlHost.update_url("/"),
            Err(TransitionError::UrlHostUnimplemented {
                method: "update_url"
            })
        );
        assert!(NoUrlHost.replace_url("/").is_err());
    }

    #[test]
    fn memory_host_pushes_and_replaces() {
        let host = MemoryUrlHost::new();
        host.replace_url("/").unwrap();
        host.update_url("/posts").unwrap();
        host.replace_url("/posts/1").unwrap();
        assert_eq!(host.entries(), ["/", "/posts/1"]);
        assert_eq!(host.current().as_deref(), Some("/posts/1"));
    }
}
