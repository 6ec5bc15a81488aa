//! Body type for HTTP transport.
//!
//! [`TransportBody`] carries both directions: it is the request body handed
//! to hyper (via [`http_body::Body`]) and the response body read back by the
//! pipeline (via [`Stream`]).

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use http_body::{Body, Frame};
use pin_project_lite::pin_project;

use crate::ClientError;

pin_project! {
    /// A request or response body.
    ///
    /// This type can represent:
    /// - Empty bodies (GET requests, 204 responses)
    /// - Full bodies (encoded request payloads, canned responses)
    /// - Streaming bodies (responses read off the wire)
    #[project = TransportBodyProj]
    pub enum TransportBody {
        /// Empty body.
        Empty,
        /// Full body with all data available.
        Full {
            data: Option<Bytes>,
        },
        /// Streaming body from an async stream.
        Streaming {
            #[pin]
            stream: Pin<Box<dyn Stream<Item = Result<Bytes, ClientError>> + Send>>,
        },
    }
}

impl TransportBody {
    /// Create an empty body.
    pub fn empty() -> Self {
        TransportBody::Empty
    }

    /// Create a body with the given data.
    pub fn full(data: Bytes) -> Self {
        TransportBody::Full { data: Some(data) }
    }

    /// Create a streaming body from the given stream.
    pub fn streaming<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, ClientError>> + Send + 'static,
    {
        TransportBody::Streaming {
            stream: Box::pin(stream),
        }
    }

    /// Read the whole body into one buffer.
    pub async fn collect(self) -> Result<Bytes, ClientError> {
        match self {
            TransportBody::Empty => Ok(Bytes::new()),
            TransportBody::Full { data } => Ok(data.unwrap_or_default()),
            TransportBody::Streaming { mut stream } => {
                let mut buf = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                Ok(buf.freeze())
            }
        }
    }
}

impl Stream for TransportBody {
    type Item = Result<Bytes, ClientError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.project() {
            TransportBodyProj::Empty => Poll::Ready(None),
            TransportBodyProj::Full { data } => Poll::Ready(data.take().map(Ok)),
            TransportBodyProj::Streaming { stream } => stream.poll_next(cx),
        }
    }
}

impl Body for TransportBody {
    type Data = Bytes;
    type Error = ClientError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match self.project() {
            TransportBodyProj::Empty => Poll::Ready(None),
            TransportBodyProj::Full { data } => {
                let result = data.take().map(|d| Ok(Frame::data(d)));
                Poll::Ready(result)
            }
            TransportBodyProj::Streaming { stream } => {
                match stream.poll_next(cx) {
                    Poll::Ready(Some(Ok(data))) => Poll::Ready(Some(Ok(Frame::data(data)))),
                    Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(e))),
                    Poll::Ready(None) => Poll::Ready(None),
                    Poll::Pending => Poll::Pending,
                }
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            TransportBody::Empty => true,
            TransportBody::Full { data } => data.is_none(),
            TransportBody::Streaming { .. } => false, // Can't know without polling
        }
    }

    fn size_hint(&self) -> http_body::SizeHint {
        match self {
            TransportBody::Empty => http_body::SizeHint::with_exact(0),
            TransportBody::Full { data } => {
                if let Some(d) = data {
                    http_body::SizeHint::with_exact(d.len() as u64)
                } else {
                    http_body::SizeHint::with_exact(0)
                }
            }
            TransportBody::Streaming { .. } => http_body::SizeHint::default(),
        }
    }
}

impl Default for TransportBody {
    fn default() -> Self {
        TransportBody::Empty
    }
}

impl std::fmt::Debug for TransportBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportBody::Empty => write!(f, "TransportBody::Empty"),
            TransportBody::Full { data } => f
                .debug_struct("TransportBody::Full")
                .field("data_len", &data.as_ref().map(|d| d.len()))
                .finish(),
            TransportBody::Streaming { .. } => write!(f, "TransportBody::Streaming"),
        }
    }
}
