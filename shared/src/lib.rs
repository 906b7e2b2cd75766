pub mod types;
pub mod error;
pub mod access;
pub mod auth;
pub mod accounts;
pub mod approvals;
pub mod submissions;
pub mod classify;
pub mod medicinal;
pub mod s3;
pub mod disclosure;

use aws_sdk_cognitoidentityprovider::Client as CognitoClient;
use aws_sdk_dynamodb::Client as DynamoClient;
use aws_sdk_s3::Client as S3Client;
use std::sync::Arc;

/// Shared application state
pub struct AppState {
    pub cognito_client: CognitoClient,
    pub dynamo_client: DynamoClient,
    pub s3_client: S3Client,
    pub classifier: classify::Classifier,
}

impl AppState {
    pub fn new(
        cognito_client: CognitoClient,
        dynamo_client: DynamoClient,
        s3_client: S3Client,
        classifier: classify::Classifier,
    ) -> Arc<Self> {
        Arc::new(Self {
            cognito_client,
            dynamo_client,
            s3_client,
            classifier,
        })
    }
}
