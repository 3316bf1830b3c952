/// 백엔드 API 클라이언트
/// 스냅샷 조회, 입찰 제출, 입찰 이력 조회, 관심 상품 반영을 담당한다.
// region:    --- Imports
use crate::auction::model::{AuctionItem, Bid};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// endregion: --- Imports

// region:    --- Request / Response
/// 입찰 요청 본문
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidRequest {
    pub bidder_id: i64,
    pub bidder_name: String,
    pub amount: i64,
    pub max_bid: Option<i64>,
    pub enable_auto_bid: bool,
}

/// 관심 상품 요청 본문
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchRequest {
    pub user_id: i64,
    pub watching: bool,
}

/// 입찰 성공 응답 본문
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidResponse {
    pub bid: Bid,
}
// endregion: --- Request / Response

// region:    --- Api Error
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("경매를 찾을 수 없습니다.")]
    NotFound,
    #[error("{message} ({code})")]
    Rejected { code: String, message: String },
    #[error("네트워크 오류: {0}")]
    Network(String),
}
// endregion: --- Api Error

// region:    --- Auction Api Trait
#[async_trait]
pub trait AuctionApi: Send + Sync {
    /// 경매 스냅샷 조회
    async fn fetch_auction(&self, auction_id: i64) -> Result<AuctionItem, ApiError>;

    /// 입찰 제출. 수락 시 서버가 확정한 입찰을 돌려받는다.
    async fn submit_bid(&self, auction_id: i64, request: &BidRequest) -> Result<Bid, ApiError>;

    /// 입찰 이력 조회
    async fn fetch_bids(&self, auction_id: i64) -> Result<Vec<Bid>, ApiError>;

    /// 관심 상품 상태 반영
    async fn update_watch(
        &self,
        auction_id: i64,
        user_id: i64,
        watching: bool,
    ) -> Result<(), ApiError>;
}
// endregion: --- Auction Api Trait

// region:    --- Http Implementation
pub struct HttpAuctionApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAuctionApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        HttpAuctionApi {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// 거부 응답 본문 {error, code} 해석
    async fn rejection(response: reqwest::Response) -> ApiError {
        let status = response.status();
        match response.json::<serde_json::Value>().await {
            Ok(body) => ApiError::Rejected {
                code: body["code"].as_str().unwrap_or("REJECTED").to_string(),
                message: body["error"].as_str().unwrap_or("입찰 거부").to_string(),
            },
            Err(_) => ApiError::Network(format!("status {}", status)),
        }
    }
}

#[async_trait]
impl AuctionApi for HttpAuctionApi {
    async fn fetch_auction(&self, auction_id: i64) -> Result<AuctionItem, ApiError> {
        let response = self
            .client
            .get(format!("{}/api/auctions/{}", self.base_url, auction_id))
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound);
        }
        if !response.status().is_success() {
            return Err(ApiError::Network(format!("status {}", response.status())));
        }
        response
            .json::<AuctionItem>()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))
    }

    async fn submit_bid(&self, auction_id: i64, request: &BidRequest) -> Result<Bid, ApiError> {
        let response = self
            .client
            .post(format!("{}/api/auctions/{}/bid", self.base_url, auction_id))
            .json(request)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound);
        }
        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }
        response
            .json::<BidResponse>()
            .await
            .map(|body| body.bid)
            .map_err(|e| ApiError::Network(e.to_string()))
    }

    async fn fetch_bids(&self, auction_id: i64) -> Result<Vec<Bid>, ApiError> {
        let response = self
            .client
            .get(format!("{}/api/auctions/{}/bids", self.base_url, auction_id))
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound);
        }
        if !response.status().is_success() {
            return Err(ApiError::Network(format!("status {}", response.status())));
        }
        response
            .json::<Vec<Bid>>()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))
    }

    async fn update_watch(
        &self,
        auction_id: i64,
        user_id: i64,
        watching: bool,
    ) -> Result<(), ApiError> {
        let request = WatchRequest { user_id, watching };
        let response = self
            .client
            .post(format!(
                "{}/api/auctions/{}/watch",
                self.base_url, auction_id
            ))
            .json(&request)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound);
        }
        if !response.status().is_success() {
            return Err(ApiError::Network(format!("status {}", response.status())));
        }
        Ok(())
    }
}
// endregion: --- Http Implementation
