//! The fetch orchestrator.
//!
//! One call does the whole journey: probe the resource across the
//! registered adapters, select a chain, gate on the caller's maximum and
//! the budget, execute the payment, fall back to the next adapter on
//! failure, account for the spend, and hand back the wrapped response.
//! Payment flows are serialised by a FIFO payment lock so concurrent
//! callers can never jointly overshoot the budget.

use std::sync::Arc;
use std::time::Duration;

use http::{HeaderMap, Method};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use url::Url;

use payfetch::adapter::{
    CapturedResponse, ProtocolAdapter, ProtocolRequest, ProtocolResult, server_message_from_body,
};
use payfetch::chain::{ChainId, ChainNamespace};
use payfetch::config::ClientConfig;
use payfetch::error::{DeliveryDiagnosis, DiagnosisPhase, Error, ErrorKind};
use payfetch::money::Money;
use payfetch::networks::{SOLANA_DEVNET, SOLANA_MAINNET};
use payfetch::record::PaymentRecord;
use payfetch_chain::signer::PaymentSigner;
use payfetch_chain::wallet::{AccountProvisioner, BalanceSource, WalletManager};
use payfetch_chain::ChainAdapter;
use payfetch_ln::invoice::Bolt11DecoderFactory;
use payfetch_ln::wallet::{LightningConnector, LnWalletManager};
use payfetch_ln::LightningAdapter;

use crate::budget::{BudgetCheck, BudgetManager, BudgetPeriod};
use crate::events::{ClientEvent, EventListener, Events};
use crate::history::PaymentHistory;
use crate::response::{PaidResponse, PaymentInfo};
use crate::router::{Probe, ProtocolRouter};
use crate::selection::select_chain;
use crate::status::{FamilyStatus, LightningStatus, WalletStatus};

/// Deadline for the plain passthrough request.
pub const PASSTHROUGH_TIMEOUT_SECS: u64 = 30;

/// Per-fetch options.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// HTTP method; defaults to GET.
    pub method: Option<Method>,
    /// Extra request headers, forwarded on every outbound request.
    pub headers: Option<HeaderMap>,
    /// Request body, forwarded on every outbound request.
    pub body: Option<Vec<u8>>,
    /// Refuse to pay more than this USD amount for this fetch.
    pub max_amount: Option<Money>,
    /// Pay on this chain family or not at all.
    pub preferred_chain: Option<ChainNamespace>,
    /// Cancellation signal; firing aborts the fetch with `aborted`.
    pub cancel: Option<CancellationToken>,
}

/// The payfetch client.
///
/// All mutable state lives on the instance; two clients share nothing.
/// Opening the same data directory from two instances concurrently is
/// not supported.
pub struct PaymentClient {
    router: ProtocolRouter,
    budget: BudgetManager,
    history: PaymentHistory,
    events: Events,
    payment_lock: tokio::sync::Mutex<()>,
    http: reqwest::Client,
    preferred_chains: Vec<ChainNamespace>,
    network: ChainId,
    evm_wallet: Option<Arc<WalletManager>>,
    svm_wallet: Option<Arc<WalletManager>>,
    ln_wallet: Option<Arc<LnWalletManager>>,
}

impl std::fmt::Debug for PaymentClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentClient")
            .field("router", &self.router)
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}

/// Builder wiring configuration, injected handles, and listeners into a
/// [`PaymentClient`].
#[derive(Default)]
pub struct PaymentClientBuilder {
    config: ClientConfig,
    chain_signer: Option<Arc<dyn PaymentSigner>>,
    decoder_factory: Option<Arc<dyn Bolt11DecoderFactory>>,
    ln_connector: Option<Arc<dyn LightningConnector>>,
    evm_provisioner: Option<Arc<dyn AccountProvisioner>>,
    svm_provisioner: Option<Arc<dyn AccountProvisioner>>,
    balance_source: Option<Arc<dyn BalanceSource>>,
    listeners: Vec<Arc<dyn EventListener>>,
    extra_adapters: Vec<Arc<dyn ProtocolAdapter>>,
}

impl std::fmt::Debug for PaymentClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentClientBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PaymentClientBuilder {
    /// Starts a builder from a configuration.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Sets the chain payment signer; without one, chain payments fail
    /// with `credentials-missing`.
    #[must_use]
    pub fn chain_signer(mut self, signer: Arc<dyn PaymentSigner>) -> Self {
        self.chain_signer = Some(signer);
        self
    }

    /// Sets the Lightning wallet connector and BOLT11 decoder factory.
    #[must_use]
    pub fn lightning(
        mut self,
        connector: Arc<dyn LightningConnector>,
        decoder_factory: Arc<dyn Bolt11DecoderFactory>,
    ) -> Self {
        self.ln_connector = Some(connector);
        self.decoder_factory = Some(decoder_factory);
        self
    }

    /// Sets the EVM account provisioner for wallet status queries.
    #[must_use]
    pub fn evm_provisioner(mut self, provisioner: Arc<dyn AccountProvisioner>) -> Self {
        self.evm_provisioner = Some(provisioner);
        self
    }

    /// Sets the Solana account provisioner for wallet status queries.
    #[must_use]
    pub fn svm_provisioner(mut self, provisioner: Arc<dyn AccountProvisioner>) -> Self {
        self.svm_provisioner = Some(provisioner);
        self
    }

    /// Sets the balance data source shared by both chain families.
    #[must_use]
    pub fn balance_source(mut self, source: Arc<dyn BalanceSource>) -> Self {
        self.balance_source = Some(source);
        self
    }

    /// Registers an event listener.
    #[must_use]
    pub fn listener(mut self, listener: Arc<dyn EventListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Registers an additional adapter after the built-in ones.
    #[must_use]
    pub fn register_adapter(mut self, adapter: Arc<dyn ProtocolAdapter>) -> Self {
        self.extra_adapters.push(adapter);
        self
    }

    /// Validates the configuration and assembles the client.
    ///
    /// # Errors
    ///
    /// Returns `bad-config` with the full per-field issue list when the
    /// configuration is invalid.
    pub async fn build(self) -> Result<PaymentClient, Error> {
        self.config.validate()?;
        let limits = self.config.budget_limits()?;
        let network = self.config.network_chain_id()?;

        let (budget_path, history_path) = if self.config.persistence.enabled {
            let dir = self.config.data_directory();
            (Some(dir.join("budget.json")), Some(dir.join("history.jsonl")))
        } else {
            (None, None)
        };
        let budget = BudgetManager::load(limits, budget_path).await;
        let history = PaymentHistory::load(
            self.config.persistence.history_max_records,
            history_path,
        )
        .await;

        let ln_wallet = self.ln_connector.map(|c| Arc::new(LnWalletManager::new(c)));

        let mut router = ProtocolRouter::new();
        let chain_adapter = match self.chain_signer {
            Some(signer) => ChainAdapter::try_new(signer)?,
            None => ChainAdapter::try_new_unsigned()?,
        };
        router.register(Arc::new(chain_adapter));
        router.register(Arc::new(LightningAdapter::try_new(
            self.decoder_factory,
            ln_wallet.clone(),
        )?));
        for adapter in self.extra_adapters {
            router.register(adapter);
        }

        let mut events = Events::new();
        for listener in self.listeners {
            events.push(listener);
        }

        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|err| Error::bad_config(format!("failed to build HTTP client: {err}")))?;

        let evm_wallet = self.evm_provisioner.map(|p| {
            Arc::new(WalletManager::new(
                ChainNamespace::Evm,
                p,
                self.balance_source.clone(),
            ))
        });
        let svm_wallet = self.svm_provisioner.map(|p| {
            Arc::new(WalletManager::new(
                ChainNamespace::Svm,
                p,
                self.balance_source.clone(),
            ))
        });

        Ok(PaymentClient {
            router,
            budget,
            history,
            events,
            payment_lock: tokio::sync::Mutex::new(()),
            http,
            preferred_chains: self.config.preferred_chains.clone(),
            network,
            evm_wallet,
            svm_wallet,
            ln_wallet,
        })
    }
}

impl PaymentClient {
    /// Starts a builder from a configuration.
    #[must_use]
    pub fn builder(config: ClientConfig) -> PaymentClientBuilder {
        PaymentClientBuilder::new(config)
    }

    /// Fetches a resource, paying for it if the server demands payment.
    ///
    /// # Errors
    ///
    /// Propagates configuration, protocol, budget, and network errors
    /// per the engine's taxonomy; an `error` event is emitted before any
    /// error is returned.
    pub async fn fetch(&self, url: &str, options: FetchOptions) -> Result<PaidResponse, Error> {
        let result = self.fetch_cancellable(url, options).await;
        match result {
            Ok(response) => Ok(response),
            Err(err) => {
                self.events.emit_error(&err);
                Err(err)
            }
        }
    }

    async fn fetch_cancellable(
        &self,
        url: &str,
        options: FetchOptions,
    ) -> Result<PaidResponse, Error> {
        let url: Url = url
            .parse()
            .map_err(|err| Error::bad_config(format!("invalid url {url:?}: {err}")))?;
        let span = tracing::info_span!("payfetch", url = %url);
        let cancel = options.cancel.clone();
        let fut = self.fetch_inner(url, options).instrument(span);
        match cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    () = token.cancelled() => {
                        Err(Error::new(ErrorKind::Aborted, "fetch aborted by caller"))
                    }
                    result = fut => result,
                }
            }
            None => fut.await,
        }
    }

    async fn fetch_inner(&self, url: Url, options: FetchOptions) -> Result<PaidResponse, Error> {
        let probes = match self.router.probe_all(&url, options.headers.as_ref()).await {
            Ok(probes) => probes,
            Err(err) if err.kind() == ErrorKind::DetectionFailed => {
                let captured = self.passthrough(&url, &options).await?;
                if captured.status != 402 {
                    return Ok(PaidResponse::unpaid(captured));
                }
                let probes = self.router.probe_from_response(&captured);
                if probes.is_empty() {
                    // A 402 nobody understands goes back to the caller
                    // unmodified.
                    return Ok(PaidResponse::unpaid(captured));
                }
                tracing::debug!(count = probes.len(), "re-probed adapters from 402 response");
                probes
            }
            Err(err) => return Err(err.into_boundary()),
        };

        let selected = select_chain(
            &probes[0].quote,
            options.preferred_chain,
            &self.preferred_chains,
        )?;

        let mut failures: Vec<Error> = Vec::new();
        for (index, probe) in probes.iter().enumerate() {
            let quote = if index == 0 {
                selected.clone()
            } else {
                probe.quote.clone()
            };
            match self.payment_flow(&url, probe, &quote, &options).await {
                Ok(response) => return Ok(response),
                Err(err) if err.kind().is_budget() => return Err(err),
                Err(err) => {
                    tracing::warn!(
                        protocol = %probe.adapter.protocol(),
                        error = %err,
                        "adapter payment failed, falling back"
                    );
                    failures.push(err);
                }
            }
        }

        let mut message = String::from("every detected payment adapter failed:");
        for (index, failure) in failures.iter().enumerate() {
            message.push_str(&format!("\n  {}. {}", index + 1, failure.message()));
        }
        let diagnosis = failures.iter().find_map(|f| f.diagnosis().cloned());
        let mut err = Error::payment_failed(message);
        if let Some(diagnosis) = diagnosis {
            err = err.with_diagnosis(diagnosis);
        }
        Err(err)
    }

    /// One payment attempt under the payment lock: gates, execute,
    /// accounting, events.
    async fn payment_flow(
        &self,
        url: &Url,
        probe: &Probe,
        quote: &payfetch::offer::ProtocolQuote,
        options: &FetchOptions,
    ) -> Result<PaidResponse, Error> {
        let _guard = self.payment_lock.lock().await;

        let usd = self.budget.convert_to_usd(&quote.amount);
        if let Some(max) = &options.max_amount
            && usd.greater_than(max)
        {
            return Err(Error::new(
                ErrorKind::PerTransactionExceeded,
                format!(
                    "quoted {} exceeds the requested maximum {}",
                    usd.to_display_string(),
                    max.to_display_string()
                ),
            ));
        }

        match self.budget.check_transaction(&usd).await {
            BudgetCheck::Within => {}
            BudgetCheck::PerTransaction { amount, limit } => {
                self.events.emit(&ClientEvent::BudgetExceeded {
                    period: None,
                    attempted: amount,
                    limit: limit.clone(),
                });
                return Err(Error::new(
                    ErrorKind::PerTransactionExceeded,
                    format!(
                        "payment of {} exceeds the per-transaction limit {}",
                        usd.to_display_string(),
                        limit.to_display_string()
                    ),
                ));
            }
            BudgetCheck::Daily { spent, limit, .. } => {
                self.events.emit(&ClientEvent::BudgetExceeded {
                    period: Some(BudgetPeriod::Daily),
                    attempted: usd.clone(),
                    limit: limit.clone(),
                });
                return Err(Error::new(
                    ErrorKind::DailyExceeded,
                    format!(
                        "payment of {} would exceed the daily limit {} ({} already spent)",
                        usd.to_display_string(),
                        limit.to_display_string(),
                        spent.to_display_string()
                    ),
                ));
            }
            BudgetCheck::Monthly { spent, limit, .. } => {
                self.events.emit(&ClientEvent::BudgetExceeded {
                    period: Some(BudgetPeriod::Monthly),
                    attempted: usd.clone(),
                    limit: limit.clone(),
                });
                return Err(Error::new(
                    ErrorKind::MonthlyExceeded,
                    format!(
                        "payment of {} would exceed the monthly limit {} ({} already spent)",
                        usd.to_display_string(),
                        limit.to_display_string(),
                        spent.to_display_string()
                    ),
                ));
            }
        }

        let request = ProtocolRequest {
            url: url.clone(),
            method: options.method.clone().unwrap_or(Method::GET),
            headers: options.headers.clone().unwrap_or_default(),
            body: options.body.clone(),
            amount: quote.amount.clone(),
            network: quote.network.clone(),
            pay_to: quote.pay_to.clone(),
        };
        let result = self
            .router
            .execute(&probe.adapter, &request)
            .await
            .map_err(Error::into_boundary)?;
        if !result.success {
            return Err(delivery_failure(&result));
        }

        self.budget.record_spending(&usd).await;
        if let Some(warning) = self.budget.check_warning().await {
            self.events.emit(&ClientEvent::BudgetWarning(warning));
        }

        let record = PaymentRecord::new(
            url.as_str(),
            probe.adapter.protocol(),
            quote.amount.clone(),
            result.tx_hash.clone(),
            result.network.clone().or_else(|| quote.network.clone()),
        );
        self.history.append(record.clone()).await;
        tracing::info!(
            protocol = %record.protocol,
            amount = %record.amount,
            "payment recorded"
        );
        self.events.emit(&ClientEvent::Payment(record.clone()));

        let payment = PaymentInfo {
            amount: quote.amount.clone(),
            protocol: probe.adapter.protocol(),
            tx_hash: record.tx_hash.clone(),
            network: record.network.clone(),
        };
        Ok(PaidResponse::paid(url.to_string(), result, payment))
    }

    async fn passthrough(
        &self,
        url: &Url,
        options: &FetchOptions,
    ) -> Result<CapturedResponse, Error> {
        let method = options.method.clone().unwrap_or(Method::GET);
        let mut request = self.http.request(method, url.clone());
        if let Some(headers) = &options.headers {
            request = request.headers(headers.clone());
        }
        if let Some(body) = &options.body {
            request = request.body(body.clone());
        }
        let response = match tokio::time::timeout(
            Duration::from_secs(PASSTHROUGH_TIMEOUT_SECS),
            request.send(),
        )
        .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                return Err(Error::new(
                    ErrorKind::EndpointUnreachable,
                    format!("request failed: {err}"),
                ));
            }
            Err(_) => {
                return Err(Error::new(
                    ErrorKind::NetworkTimeout,
                    format!("plain request timed out after {PASSTHROUGH_TIMEOUT_SECS} s"),
                ));
            }
        };
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let url = response.url().to_string();
        let body = response
            .bytes()
            .await
            .map_err(|err| {
                Error::new(
                    ErrorKind::EndpointUnreachable,
                    format!("failed reading response body: {err}"),
                )
            })?
            .to_vec();
        Ok(CapturedResponse {
            url,
            status,
            headers,
            body,
        })
    }

    /// Composes the degradable wallet status snapshot.
    pub async fn wallet_status(&self) -> WalletStatus {
        let evm = match &self.evm_wallet {
            Some(manager) => {
                let balance = manager.balances(&self.network).await;
                Some(FamilyStatus {
                    address: balance.address,
                    balance: balance.balance,
                })
            }
            None => None,
        };
        let svm = match &self.svm_wallet {
            Some(manager) => {
                let balance = manager.balances(&self.solana_network()).await;
                Some(FamilyStatus {
                    address: balance.address,
                    balance: balance.balance,
                })
            }
            None => None,
        };
        let lightning = match &self.ln_wallet {
            Some(manager) => Some(LightningStatus {
                balance: manager.balance_sats().await.map(Money::from_satoshis),
            }),
            None => None,
        };
        WalletStatus {
            evm,
            svm,
            lightning,
            budget: self.budget.snapshot().await,
        }
    }

    /// The Solana network paired with the configured EVM network:
    /// testnet EVM targets pair with devnet, everything else with
    /// mainnet.
    fn solana_network(&self) -> ChainId {
        if self.network.reference() == "84532" {
            ChainId::new("solana", SOLANA_DEVNET)
        } else {
            ChainId::new("solana", SOLANA_MAINNET)
        }
    }

    /// The budget manager.
    #[must_use]
    pub const fn budget(&self) -> &BudgetManager {
        &self.budget
    }

    /// Retained payment records, oldest first.
    pub async fn history(&self) -> Vec<PaymentRecord> {
        self.history.records().await
    }
}

/// Diagnoses a delivered-but-failed response per the status table.
fn delivery_failure(result: &ProtocolResult) -> Error {
    let server_message = server_message_from_body(&result.body);
    let suggestion = match result.status {
        401 => "the endpoint requires additional authentication beyond the payment".to_string(),
        400 => match &server_message {
            Some(message) => format!("the server rejected the paid request: {message}"),
            None => "the server rejected the paid request".to_string(),
        },
        403 => "the endpoint denied access to this account".to_string(),
        404 => "the endpoint was not found; check the URL".to_string(),
        500..=599 => "the server failed internally; retry later".to_string(),
        _ => "the server answered the paid request with an unexpected status".to_string(),
    };
    let mut diagnosis = DeliveryDiagnosis::for_phase(DiagnosisPhase::Delivery)
        .sent()
        .with_status(result.status)
        .with_suggestion(suggestion);
    if let Some(message) = server_message {
        diagnosis = diagnosis.with_server_message(message);
    }
    if !result.attempts.is_empty() {
        diagnosis = diagnosis.with_attempts(result.attempts.clone());
    }
    Error::payment_failed(format!(
        "payment was delivered but the request failed with status {}",
        result.status
    ))
    .with_diagnosis(diagnosis)
}
