// tests/stream_client_test.rs
#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::{DateTime, Duration as ChronoDuration, Utc};
    use mockall::mock;
    use mockall::predicate::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::time::Duration;

    use pbx_billing_engine::error::BillingError;
    use pbx_billing_engine::models::{
        CallRecord, Extension, ExtensionBudget, ExtensionProfile, NewCallRecord, PbxConfiguration,
        TokenGrant,
    };
    use pbx_billing_engine::pbx::{AuthEndpoint, PbxControl, PbxEndpoint, TokenManager};
    use pbx_billing_engine::services::CallSessionEngine;
    use pbx_billing_engine::store::{
        CallLedger, ConfigurationProvider, ExtensionDirectory, PricingResolver,
    };
    use pbx_billing_engine::stream::EventStreamClient;

    mock! {
        Extensions {}

        #[async_trait]
        impl ExtensionDirectory for Extensions {
            async fn find_by_number(&self, number: &str) -> Result<Option<Extension>, BillingError>;
            async fn update_balance(&self, number: &str, new_balance: Decimal) -> Result<(), BillingError>;
            async fn list_budgets(&self) -> Result<Vec<ExtensionBudget>, BillingError>;
            async fn reset_balance(
                &self,
                extension_id: i64,
                amount: Decimal,
                budget_label: &str,
                year: i32,
                month: u32,
            ) -> Result<(), BillingError>;
            async fn sync_profiles(&self, profiles: &[ExtensionProfile]) -> Result<usize, BillingError>;
        }
    }

    mock! {
        Ledger {}

        #[async_trait]
        impl CallLedger for Ledger {
            async fn create(&self, record: NewCallRecord) -> Result<(), BillingError>;
            async fn find_by_call_id(&self, call_id: &str) -> Result<Option<CallRecord>, BillingError>;
            async fn complete(
                &self,
                call_id: &str,
                end_time: DateTime<Utc>,
                duration_seconds: i64,
                cost: Decimal,
            ) -> Result<(), BillingError>;
        }
    }

    mock! {
        Pricing {}

        #[async_trait]
        impl PricingResolver for Pricing {
            async fn rate_for(&self, dialed_number: &str) -> Result<Decimal, BillingError>;
            async fn is_free(&self, dialed_number: &str) -> Result<bool, BillingError>;
        }
    }

    mock! {
        Pbx {}

        #[async_trait]
        impl PbxControl for Pbx {
            async fn hangup_channel(&self, channel_id: &str) -> Result<(), BillingError>;
        }
    }

    mock! {
        Auth {}

        #[async_trait]
        impl AuthEndpoint for Auth {
            async fn request_token(
                &self,
                base_url: &str,
                client_id: &str,
                secret_id: &str,
            ) -> Result<TokenGrant, BillingError>;

            async fn refresh_token(
                &self,
                base_url: &str,
                refresh_token: &str,
            ) -> Result<TokenGrant, BillingError>;
        }
    }

    mock! {
        Configs {}

        #[async_trait]
        impl ConfigurationProvider for Configs {
            async fn find_active(&self) -> Result<Option<PbxConfiguration>, BillingError>;
        }
    }

    fn endpoint(port: u16) -> PbxEndpoint {
        PbxEndpoint {
            port,
            api_path: "openapi/v1.0".to_string(),
        }
    }

    fn extension(balance: Decimal) -> Extension {
        Extension {
            id: 7,
            number: "1001".to_string(),
            balance,
        }
    }

    fn engine(
        extensions: MockExtensions,
        ledger: MockLedger,
        pricing: MockPricing,
    ) -> Arc<CallSessionEngine> {
        Arc::new(CallSessionEngine::new(
            Arc::new(extensions),
            Arc::new(ledger),
            Arc::new(pricing),
            Arc::new(MockPbx::new()),
        ))
    }

    fn client(engine: Arc<CallSessionEngine>) -> EventStreamClient {
        let tokens = Arc::new(TokenManager::new(
            Arc::new(MockAuth::new()),
            Arc::new(MockConfigs::new()),
            endpoint(8088),
        ));
        EventStreamClient::new(
            tokens,
            Arc::new(MockConfigs::new()),
            engine,
            endpoint(8088),
            Duration::from_secs(5),
        )
    }

    fn call_status_frame(member_status: &str, channel_id: Option<&str>) -> String {
        let mut extension = json!({ "number": "1001", "member_status": member_status });
        if let Some(channel_id) = channel_id {
            extension["channel_id"] = json!(channel_id);
        }
        let msg = json!({
            "call_id": "c-9",
            "members": [
                { "extension": extension },
                { "outbound": { "number": "0788112233", "to": "0788112233" } }
            ]
        })
        .to_string();
        json!({ "type": 30011, "msg": msg }).to_string()
    }

    #[tokio::test]
    async fn answered_frame_opens_a_session() {
        let mut extensions = MockExtensions::new();
        extensions
            .expect_find_by_number()
            .with(eq("1001"))
            .returning(|_| Ok(Some(extension(dec!(500)))));

        let mut ledger = MockLedger::new();
        ledger.expect_find_by_call_id().returning(|_| Ok(None));
        ledger
            .expect_create()
            .withf(|record| record.call_id == "c-9" && record.extension_number == "1001")
            .times(1)
            .returning(|_| Ok(()));

        let mut pricing = MockPricing::new();
        pricing.expect_is_free().returning(|_| Ok(false));
        pricing.expect_rate_for().returning(|_| Ok(dec!(100)));

        let engine = engine(extensions, ledger, pricing);
        let client = client(engine.clone());

        client
            .dispatch(&call_status_frame("ANSWERED", Some("ch-9")))
            .await;

        assert_eq!(engine.session_count().await, 1);
    }

    #[tokio::test]
    async fn ring_frame_touches_nothing() {
        // No expectations: any store or PBX call fails the test
        let engine = engine(MockExtensions::new(), MockLedger::new(), MockPricing::new());
        let client = client(engine.clone());

        client.dispatch(&call_status_frame("RING", None)).await;

        assert_eq!(engine.session_count().await, 0);
    }

    #[tokio::test]
    async fn call_report_frame_settles_the_call() {
        let mut extensions = MockExtensions::new();
        extensions
            .expect_find_by_number()
            .with(eq("1001"))
            .returning(|_| Ok(Some(extension(dec!(1000)))));
        extensions
            .expect_update_balance()
            .with(eq("1001"), eq(dec!(700)))
            .times(1)
            .returning(|_, _| Ok(()));

        let mut ledger = MockLedger::new();
        ledger.expect_find_by_call_id().with(eq("c-9")).returning(|_| {
            Ok(Some(CallRecord {
                call_id: "c-9".to_string(),
                extension_number: "1001".to_string(),
                extension_id: 7,
                start_time: Utc::now() - ChronoDuration::seconds(150),
                end_time: None,
                duration_seconds: None,
                cost: None,
            }))
        });
        ledger
            .expect_complete()
            .withf(|call_id, _, _, cost| call_id == "c-9" && *cost == dec!(300))
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let mut pricing = MockPricing::new();
        pricing.expect_is_free().returning(|_| Ok(false));
        pricing.expect_rate_for().returning(|_| Ok(dec!(100)));

        let engine = engine(extensions, ledger, pricing);
        let client = client(engine);

        let msg = json!({
            "call_id": "c-9",
            "call_from": "1001",
            "call_to": "0788112233",
            "call_duration": 150
        })
        .to_string();
        let frame = json!({ "type": 30012, "msg": msg }).to_string();

        client.dispatch(&frame).await;
    }

    #[tokio::test]
    async fn undecodable_and_unknown_frames_are_discarded() {
        let engine = engine(MockExtensions::new(), MockLedger::new(), MockPricing::new());
        let client = client(engine.clone());

        client.dispatch("not json at all").await;
        client.dispatch(r#"{"type":30015,"msg":"{}"}"#).await;
        client.dispatch(r#"{"type":10000,"msg":"ok"}"#).await;

        assert_eq!(engine.session_count().await, 0);
    }

    #[tokio::test]
    async fn retry_reuses_the_cached_token() {
        let mut auth = MockAuth::new();
        // One full authentication serves every connection attempt
        auth.expect_request_token()
            .times(1)
            .returning(|_, _, _| {
                Ok(TokenGrant {
                    access_token: "acc".to_string(),
                    refresh_token: "acc-refresh".to_string(),
                    access_ttl_secs: 1800,
                    refresh_ttl_secs: 86400,
                })
            });

        let config = || {
            Ok(Some(PbxConfiguration {
                id: 1,
                ip: "127.0.0.1".to_string(),
                client_id: "client".to_string(),
                secret_id: "secret".to_string(),
            }))
        };

        let mut token_configs = MockConfigs::new();
        token_configs.expect_find_active().returning(config);
        let mut client_configs = MockConfigs::new();
        client_configs.expect_find_active().returning(config);

        // Port 9 has no listener; both attempts die at the socket, after
        // the token step.
        let tokens = Arc::new(TokenManager::new(
            Arc::new(auth),
            Arc::new(token_configs),
            endpoint(9),
        ));
        let engine = engine(MockExtensions::new(), MockLedger::new(), MockPricing::new());
        let client = EventStreamClient::new(
            tokens,
            Arc::new(client_configs),
            engine,
            endpoint(9),
            Duration::from_secs(5),
        );

        let first = client.connect_and_listen().await;
        let second = client.connect_and_listen().await;

        assert!(matches!(first, Err(BillingError::Transport(_))));
        assert!(matches!(second, Err(BillingError::Transport(_))));
    }
}
