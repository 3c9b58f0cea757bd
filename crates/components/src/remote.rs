//! Remote file requests
//!
//! Components that reference a remote image or attachment register a request
//! during load or binding. The host fetches the bytes however it likes and
//! calls [`crate::Document::complete_remote_request`] with the outcome; the
//! request's callback then stores the result in the shared resources. Each
//! request completes at most once.

use crate::{GenerationError, NodeId, Result, TraceLog};
use data_binding::ConformanceMode;
use resources::{ResourceType, SharedResources};
use std::fmt;
use std::rc::Rc;

/// Fetched bytes, or the reason the fetch failed
pub type RemoteOutcome = std::result::Result<Rc<Vec<u8>>, String>;

pub type RemoteCallback = Box<dyn FnOnce(&mut SharedResources, RemoteOutcome) -> Result<()>>;

/// Identifier of a registered request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(usize);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub struct RemoteFileRequest {
    path: String,
    resource_type: ResourceType,
    key: String,
    owner: Option<NodeId>,
    callback: Option<RemoteCallback>,
    completed: bool,
}

impl fmt::Debug for RemoteFileRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteFileRequest")
            .field("path", &self.path)
            .field("resource_type", &self.resource_type)
            .field("key", &self.key)
            .field("owner", &self.owner)
            .field("completed", &self.completed)
            .finish()
    }
}

impl RemoteFileRequest {
    pub fn new(
        path: impl Into<String>,
        resource_type: ResourceType,
        key: impl Into<String>,
        callback: RemoteCallback,
    ) -> Self {
        Self {
            path: path.into(),
            resource_type,
            key: key.into(),
            owner: None,
            callback: Some(callback),
            completed: false,
        }
    }

    pub fn owned_by(mut self, owner: NodeId) -> Self {
        self.owner = Some(owner);
        self
    }

    /// The remote location to fetch
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    /// Key the fetched resource is stored under
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn owner(&self) -> Option<NodeId> {
        self.owner
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }
}

/// The requests of one document
#[derive(Debug, Default)]
pub struct RemoteRequestQueue {
    requests: Vec<RemoteFileRequest>,
}

impl RemoteRequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request. A pending request for the same resource is reused.
    pub fn register(&mut self, request: RemoteFileRequest) -> RequestId {
        if let Some(existing) = self.requests.iter().position(|r| {
            !r.completed && r.resource_type == request.resource_type && r.key == request.key
        }) {
            tracing::debug!(path = %request.path, "remote request already pending");
            return RequestId(existing);
        }
        tracing::debug!(path = %request.path, kind = %request.resource_type, "remote request registered");
        self.requests.push(request);
        RequestId(self.requests.len() - 1)
    }

    pub fn get(&self, id: RequestId) -> Option<&RemoteFileRequest> {
        self.requests.get(id.0)
    }

    /// Requests still waiting for the host
    pub fn pending(&self) -> impl Iterator<Item = (RequestId, &RemoteFileRequest)> {
        self.requests
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.completed)
            .map(|(i, r)| (RequestId(i), r))
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Deliver the outcome of a fetch. Returns `false` when the request had
    /// already completed. When the resource was supplied by another path in
    /// the meantime the request completes without running its callback.
    pub fn complete(
        &mut self,
        id: RequestId,
        outcome: RemoteOutcome,
        resources: &mut SharedResources,
        conformance: ConformanceMode,
        trace: &mut TraceLog,
    ) -> Result<bool> {
        let request = self
            .requests
            .get_mut(id.0)
            .ok_or_else(|| GenerationError::Reference(format!("no remote request {}", id)))?;

        if request.completed {
            tracing::warn!(path = %request.path, "remote request completed twice, ignoring");
            return Ok(false);
        }
        request.completed = true;
        let callback = request.callback.take();

        if resources.contains(request.resource_type, &request.key) {
            tracing::debug!(path = %request.path, "remote resource already present");
            return Ok(true);
        }

        let Some(callback) = callback else {
            return Ok(true);
        };
        let path = request.path.clone();
        if let Err(e) = callback(resources, outcome) {
            if e.always_propagates() {
                return Err(e);
            }
            match conformance {
                ConformanceMode::Lax => trace.error("Remote", format!("{}: {}", path, e)),
                ConformanceMode::Strict => {
                    return Err(GenerationError::Reference(format!("remote file {}: {}", path, e)))
                }
            }
        }
        Ok(true)
    }

    /// Check nothing is still pending before layout
    pub fn ensure_fulfilled(&self, conformance: ConformanceMode, trace: &mut TraceLog) -> Result<()> {
        let pending: Vec<&str> = self.pending().map(|(_, r)| r.path()).collect();
        if pending.is_empty() {
            return Ok(());
        }
        match conformance {
            ConformanceMode::Strict => Err(GenerationError::Reference(format!(
                "{} remote request(s) not fulfilled: {}",
                pending.len(),
                pending.join(", ")
            ))),
            ConformanceMode::Lax => {
                for path in pending {
                    trace.warn("Remote", format!("remote file {} was never supplied", path));
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TraceLevel;
    use resources::AttachmentData;
    use std::cell::Cell;

    fn store_attachment(key: &'static str, calls: Rc<Cell<usize>>) -> RemoteCallback {
        Box::new(move |resources, outcome| {
            calls.set(calls.get() + 1);
            let bytes = outcome.map_err(GenerationError::Reference)?;
            resources.add_attachment(key, AttachmentData::new("notes.txt", bytes));
            Ok(())
        })
    }

    #[test]
    fn test_callback_runs_once() {
        let calls = Rc::new(Cell::new(0));
        let mut queue = RemoteRequestQueue::new();
        let mut resources = SharedResources::new();
        let mut trace = TraceLog::new(TraceLevel::Debug);
        let id = queue.register(RemoteFileRequest::new(
            "https://example.com/notes.txt",
            ResourceType::Attachment,
            "notes",
            store_attachment("notes", Rc::clone(&calls)),
        ));

        let bytes = Rc::new(b"hello".to_vec());
        assert!(queue
            .complete(id, Ok(Rc::clone(&bytes)), &mut resources, ConformanceMode::Strict, &mut trace)
            .unwrap());
        assert!(!queue
            .complete(id, Ok(bytes), &mut resources, ConformanceMode::Strict, &mut trace)
            .unwrap());
        assert_eq!(calls.get(), 1);
        assert!(resources.attachment("notes").is_some());
    }

    #[test]
    fn test_already_supplied_skips_callback() {
        let calls = Rc::new(Cell::new(0));
        let mut queue = RemoteRequestQueue::new();
        let mut resources = SharedResources::new();
        resources.add_attachment("notes", AttachmentData::new("notes.txt", Rc::new(vec![1])));
        let mut trace = TraceLog::default();
        let id = queue.register(RemoteFileRequest::new(
            "https://example.com/notes.txt",
            ResourceType::Attachment,
            "notes",
            store_attachment("notes", Rc::clone(&calls)),
        ));

        assert!(queue
            .complete(id, Err("offline".into()), &mut resources, ConformanceMode::Strict, &mut trace)
            .unwrap());
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_failed_fetch_by_conformance() {
        let mut resources = SharedResources::new();
        let mut trace = TraceLog::new(TraceLevel::Debug);

        let mut lax = RemoteRequestQueue::new();
        let id = lax.register(RemoteFileRequest::new(
            "https://example.com/a",
            ResourceType::Attachment,
            "a",
            store_attachment("a", Rc::new(Cell::new(0))),
        ));
        assert!(lax
            .complete(id, Err("404".into()), &mut resources, ConformanceMode::Lax, &mut trace)
            .unwrap());
        assert_eq!(trace.entries_at(TraceLevel::Error).count(), 1);

        let mut strict = RemoteRequestQueue::new();
        let id = strict.register(RemoteFileRequest::new(
            "https://example.com/b",
            ResourceType::Attachment,
            "b",
            store_attachment("b", Rc::new(Cell::new(0))),
        ));
        let err = strict
            .complete(id, Err("404".into()), &mut resources, ConformanceMode::Strict, &mut trace)
            .unwrap_err();
        assert!(matches!(err, GenerationError::Reference(_)));
    }

    #[test]
    fn test_pending_requests_before_layout() {
        let mut queue = RemoteRequestQueue::new();
        let mut trace = TraceLog::new(TraceLevel::Debug);
        queue.register(RemoteFileRequest::new(
            "https://example.com/logo.jpg",
            ResourceType::Image,
            "logo",
            Box::new(|_, _| Ok(())),
        ));

        assert!(queue.ensure_fulfilled(ConformanceMode::Strict, &mut trace).is_err());
        queue.ensure_fulfilled(ConformanceMode::Lax, &mut trace).unwrap();
        assert_eq!(trace.entries_at(TraceLevel::Warning).count(), 1);
    }
}
