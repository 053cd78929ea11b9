//! Connection establishment under a retry policy.

use async_trait::async_trait;
use cadence_common::retry::{RetryCallback, RetryContext, RetryResult, RetryTemplate};
use tracing::info;

/// Something that can be connected, such as a transport client.
#[async_trait]
pub trait Connectable: Send + Sync {
    async fn connect(&self) -> anyhow::Result<()>;

    /// Human-readable target, e.g. `"broker amqp://orders:5672"`
    fn description(&self) -> String;
}

struct ConnectAttempt<'a, C: ?Sized> {
    connectable: &'a C,
}

#[async_trait]
impl<C> RetryCallback for ConnectAttempt<'_, C>
where
    C: Connectable + ?Sized,
{
    async fn do_work(&self, context: &mut RetryContext) -> anyhow::Result<()> {
        self.connectable.connect().await?;
        context.add_return_message(format!("connected to {}", self.connectable.description()));
        Ok(())
    }

    fn work_description(&self) -> String {
        format!("connecting to {}", self.connectable.description())
    }
}

/// Connect through `template`, retrying as its policy allows.
///
/// # Errors
///
/// [`RetryError::Exhausted`](cadence_common::RetryError::Exhausted) wrapping
/// the last connection failure once the policy gives up.
pub async fn connect_with_retry<C>(
    connectable: &C,
    template: &RetryTemplate,
) -> RetryResult<RetryContext>
where
    C: Connectable + ?Sized,
{
    let context = template.execute(&ConnectAttempt { connectable }).await?;
    if context.is_ok() {
        info!(
            target_name = %connectable.description(),
            attempts = context.attempts(),
            "connection established"
        );
    }
    Ok(context)
}
