use crate::common::UserId;

/// Decides who may control playback in a room.
pub trait PermissionCheck: Send + Sync {
    fn can_control(&self, user: UserId) -> bool;
}

impl<F> PermissionCheck for F
where
    F: Fn(UserId) -> bool + Send + Sync,
{
    fn can_control(&self, user: UserId) -> bool {
        self(user)
    }
}

/// Everyone may control playback.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl PermissionCheck for AllowAll {
    fn can_control(&self, _user: UserId) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_act_as_checks() {
        let only_seven = |user: UserId| user == UserId(7);
        assert!(only_seven.can_control(UserId(7)));
        assert!(!only_seven.can_control(UserId(8)));
        assert!(AllowAll.can_control(UserId(8)));
    }
}
