use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::api::{FileApi, ProgressFn, UploadFile};
use crate::error::{CancelledError, NetworkError, TransferError};
use crate::models::OperationResponse;
use crate::session::SessionStore;

/// Every request to the remote api goes through here: base url prefixing,
/// bearer token, response logging, error translation and the global 401 rule.
pub struct HttpGateway {
    client: Client,
    base_url: String,
    session: Arc<SessionStore>,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>, session: Arc<SessionStore>) -> Result<Self, NetworkError> {
        let client = Client::builder()
            .user_agent(concat!("afs-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| NetworkError::Client(e.to_string()))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        tracing::debug!("Gateway targeting {}", base_url);

        Ok(Self {
            client,
            base_url,
            session,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match self.session.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, NetworkError> {
        self.send_json(self.request(Method::GET, path)).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, NetworkError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(self.request(Method::POST, path).json(body)).await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, NetworkError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(self.request(Method::PUT, path).json(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, NetworkError> {
        self.send_json(self.request(Method::DELETE, path)).await
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, NetworkError> {
        let response = self.send(builder).await?;
        response.json::<T>().await.map_err(|e| {
            tracing::error!("Failed to decode response body: {}", e);
            NetworkError::Client(format!("invalid response body: {}", e))
        })
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, NetworkError> {
        let request = builder
            .build()
            .map_err(|e| NetworkError::Client(e.to_string()))?;
        let method = request.method().clone();
        let url = request.url().clone();
        let started = Instant::now();

        match self.client.execute(request).await {
            Ok(response) => {
                tracing::debug!(
                    "[HTTP] {} {} {} {}ms",
                    method,
                    url,
                    response.status().as_u16(),
                    started.elapsed().as_millis()
                );
                self.check_status(response)
            }
            Err(e) => {
                let err = NetworkError::from_transport(&e);
                tracing::error!(
                    "[HTTP] {} {} failed after {}ms: {}",
                    method,
                    url,
                    started.elapsed().as_millis(),
                    e
                );
                Err(err)
            }
        }
    }

    // non-2xx becomes a uniform error; 401 also ends the session
    fn check_status(&self, response: Response) -> Result<Response, NetworkError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let err = NetworkError::Server {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
        };
        tracing::error!("HTTP Request Error {}: {}", response.url(), err);

        if status == StatusCode::UNAUTHORIZED {
            self.session.expire();
        }
        Err(err)
    }

    async fn send_cancellable(
        &self,
        builder: RequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<Response, TransferError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(CancelledError.into()),
            result = self.send(builder) => Ok(result?),
        }
    }
}

#[async_trait]
impl FileApi for HttpGateway {
    async fn mutate(
        &self,
        endpoint: &str,
        body: serde_json::Value,
    ) -> Result<OperationResponse, NetworkError> {
        self.post(endpoint, &body).await
    }

    async fn upload(
        &self,
        file: UploadFile,
        target_path: &str,
        progress: ProgressFn,
        cancel: CancellationToken,
    ) -> Result<OperationResponse, TransferError> {
        let total = file.size;
        let name = file.name.clone();
        tracing::debug!("Uploading {} ({} bytes) to {}", name, total, target_path);

        let mut sent = 0u64;
        let counted = file.into_stream().await?.map(move |chunk| {
            if let Ok(bytes) = &chunk {
                sent += bytes.len() as u64;
                progress(sent, Some(total));
            }
            chunk
        });

        let part = Part::stream_with_length(Body::wrap_stream(counted), total).file_name(name);
        let form = Form::new()
            .text("path", target_path.to_string())
            .part("file", part);

        let response = self
            .send_cancellable(self.request(Method::POST, "/files/upload").multipart(form), &cancel)
            .await?;

        let body = tokio::select! {
            _ = cancel.cancelled() => return Err(CancelledError.into()),
            body = response.text() => body.map_err(|e| NetworkError::from_transport(&e))?,
        };
        if body.trim().is_empty() {
            return Ok(OperationResponse::ok());
        }
        match serde_json::from_str::<OperationResponse>(&body) {
            Ok(parsed) => Ok(parsed),
            Err(e) => {
                tracing::debug!("Upload response is not an operation response ({}), assuming success", e);
                Ok(OperationResponse::ok())
            }
        }
    }

    async fn download(
        &self,
        remote_path: &str,
        destination: &Path,
        progress: ProgressFn,
        cancel: CancellationToken,
    ) -> Result<u64, TransferError> {
        let path = format!("/files/download?path={}", urlencoding::encode(remote_path));
        let response = self
            .send_cancellable(self.request(Method::GET, &path), &cancel)
            .await?;
        let total = response.content_length();
        tracing::debug!("Downloading {} ({:?} bytes) to {:?}", remote_path, total, destination);

        let mut file = tokio::fs::File::create(destination).await?;
        let mut stream = Box::pin(response.bytes_stream());
        let mut received = 0u64;

        let outcome: Result<u64, TransferError> = async {
            loop {
                let chunk = tokio::select! {
                    _ = cancel.cancelled() => return Err(CancelledError.into()),
                    chunk = stream.next() => chunk,
                };
                match chunk {
                    Some(Ok(bytes)) => {
                        file.write_all(&bytes).await?;
                        received += bytes.len() as u64;
                        progress(received, total);
                    }
                    Some(Err(e)) => return Err(NetworkError::from_transport(&e).into()),
                    None => break,
                }
            }
            file.flush().await?;
            Ok::<u64, TransferError>(received)
        }
        .await;

        if outcome.is_err() {
            drop(file);
            if let Err(e) = tokio::fs::remove_file(destination).await {
                tracing::warn!("Failed to remove partial download {:?}: {}", destination, e);
            }
        }
        outcome
    }
}
