//  Copyright 2024 COVERED Project Authors
//
//  Licensed under the Apache License, Version 2.0 (the "License");
//  you may not use this file except in compliance with the License.
//  You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.

//! `EdgeTransport`: the cross-edge RPC collaborator (§5 "Shared-resource
//! policy": "a single socket must not serialize unrelated key operations").
//! `CooperationProtocol` issues one [`Message`] and awaits the paired
//! response; `send_request` is expected to fan requests for different keys
//! out over a shared connection pool rather than queue them behind one
//! another.

use std::time::Duration;

use covered_common::edgeset::EdgeIndex;
use covered_common::{CoreError, Result};

use crate::protocol::Message;

pub trait EdgeTransport: Send + Sync {
    /// Send `request` to `to_edge` and await its paired response, or
    /// [`CoreError::Transient`] on timeout/transport drop. Timeouts are the
    /// caller's (`CooperationProtocol`'s) responsibility to classify as
    /// degradable per §7; this trait only ever reports the raw failure.
    async fn send_request(&self, to_edge: EdgeIndex, request: Message, timeout: Duration) -> Result<Message>;

    /// Best-effort send with no reply expected (acks are not awaited on the
    /// send side in our model; the sender fires and forgets, the invalidated
    /// edge acks only so the transport layer can retire the in-flight slot).
    async fn send_notify(&self, to_edge: EdgeIndex, message: Message) -> Result<()>;
}

/// Wrap a transport call with the operation timeout from configuration,
/// translating a `tokio::time::error::Elapsed` into the same
/// [`CoreError::Transient`] a dropped connection would produce.
pub async fn with_timeout<F, T>(edge: EdgeIndex, timeout: Duration, fut: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(CoreError::Transient {
            edge,
            reason: "operation timed out".into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn with_timeout_surfaces_elapsed_as_transient() {
        let result: Result<()> = with_timeout(3, Duration::from_millis(5), async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(CoreError::Transient { edge: 3, .. })));
    }

    #[tokio::test]
    async fn with_timeout_passes_through_fast_results() {
        let result: Result<u32> = with_timeout(0, Duration::from_millis(50), async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }
}
