use std::future::Future;

/// Outcome of an exhausted retry loop.
#[derive(Debug)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last: E,
}

/// Bounded retry with a side effect on every failed attempt.
///
/// There is no backoff: attempts run back to back. A budget of zero is
/// treated as one attempt.
#[derive(Debug, Clone, Copy)]
pub struct BoundedRetry {
    max_attempts: u32,
}

impl BoundedRetry {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `op` until it succeeds or the budget is spent.
    ///
    /// `op` receives the 1-based attempt number. `on_failure` runs after each
    /// failed attempt, including the last one.
    pub async fn run<T, E, Op, Fut, Hook>(
        &self,
        mut op: Op,
        mut on_failure: Hook,
    ) -> Result<T, RetryExhausted<E>>
    where
        Op: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        Hook: FnMut(u32, &E),
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    on_failure(attempt, &e);
                    if attempt >= self.max_attempts {
                        return Err(RetryExhausted { attempts: attempt, last: e });
                    }
                    attempt += 1;
                }
            }
        }
    }
}
