use crate::error::ClientError;
use crate::state::MediaRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
    Undetermined,
}

/// Platform camera boundary. Capture and the permission dialog live on the
/// other side; only the still's encoded bytes cross it.
pub trait Camera: Send {
    fn permission(&self) -> Permission;
    fn request_permission(&mut self) -> Permission;
    fn capture_still(&mut self) -> Result<MediaRef, ClientError>;
}

/// Capture a still, requesting camera permission first when it is not
/// already granted. Denial aborts before any capture is attempted.
pub fn capture_with_permission(camera: &mut dyn Camera) -> Result<MediaRef, ClientError> {
    let granted = match camera.permission() {
        Permission::Granted => true,
        Permission::Denied | Permission::Undetermined => {
            matches!(camera.request_permission(), Permission::Granted)
        }
    };
    if !granted {
        return Err(ClientError::PermissionDenied);
    }
    camera.capture_still()
}
