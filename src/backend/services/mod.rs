pub mod allocation;
pub mod app_service;
pub mod membership;
pub mod signup;

#[cfg(test)]
pub mod test_support {
    use crate::error::GroupApiError;
    use crate::models::AccessCredential;
    use crate::services::membership::GroupDirectory;
    use std::cell::RefCell;
    use std::future::Future;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    /// Group directory double with canned answers and a call log.
    pub struct ScriptedDirectory {
        pub add_result: Result<bool, GroupApiError>,
        pub membership_result: Result<bool, GroupApiError>,
        pub policy_result: Result<bool, GroupApiError>,
        /// Suspend once before answering so that concurrent callers interleave.
        pub yield_first: bool,
        pub calls: RefCell<Vec<String>>,
    }

    impl Default for ScriptedDirectory {
        fn default() -> Self {
            Self {
                add_result: Ok(true),
                membership_result: Ok(false),
                policy_result: Ok(true),
                yield_first: false,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl ScriptedDirectory {
        pub fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }

        pub fn add_calls(&self) -> usize {
            self.calls.borrow().iter().filter(|c| c.starts_with("add:")).count()
        }

        async fn answer(&self, call: String, result: &Result<bool, GroupApiError>) -> Result<bool, GroupApiError> {
            self.calls.borrow_mut().push(call);
            if self.yield_first {
                YieldNow(false).await;
            }
            result.clone()
        }
    }

    impl GroupDirectory for ScriptedDirectory {
        async fn check_membership(&self, group: &str, user: &str, _: &AccessCredential) -> Result<bool, GroupApiError> {
            self.answer(format!("check:{}:{}", group, user), &self.membership_result).await
        }

        async fn add_member(&self, group: &str, user: &str, _: &AccessCredential) -> Result<bool, GroupApiError> {
            self.answer(format!("add:{}:{}", group, user), &self.add_result).await
        }

        async fn check_external_member_policy(&self, group: &str, _: &AccessCredential) -> Result<bool, GroupApiError> {
            self.answer(format!("policy:{}", group), &self.policy_result).await
        }
    }

    /// Returns `Pending` exactly once.
    struct YieldNow(bool);

    impl Future for YieldNow {
        type Output = ();

        fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
            if self.0 {
                Poll::Ready(())
            } else {
                self.0 = true;
                cx.waker().wake_by_ref();
                Poll::Pending
            }
        }
    }
}
