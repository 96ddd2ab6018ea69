use aws_sdk_s3::Client as S3Client;
use std::sync::Arc;

use crate::routing::RoutingAdvisor;
use crate::shared::db::DbPool;
use crate::web::auth::AuthConfig;

#[derive(Clone)]
pub struct AppState {
    pub conn: DbPool,
    pub advisor: Arc<dyn RoutingAdvisor>,
    pub blob: Option<S3Client>,
    pub bucket: String,
    pub auth: AuthConfig,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("blob", &self.blob.is_some())
            .field("bucket", &self.bucket)
            .finish()
    }
}
