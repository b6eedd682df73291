//! Typed commands and events
//!
//! The router itself is generic over method names. These structs cover the
//! methods the router relies on plus a few common ones; anything else can
//! go through `send_raw` with a `serde_json::Value`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A command: params are `Self`, the result is `Response`.
pub trait Command: Serialize {
    const METHOD: &'static str;
    type Response: DeserializeOwned;
}

/// An event payload.
pub trait Event: DeserializeOwned {
    const NAME: &'static str;
}

/// Result shape for commands that return `{}`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Empty {}

macro_rules! command {
    ($ty:ty, $method:literal, $response:ty) => {
        impl Command for $ty {
            const METHOD: &'static str = $method;
            type Response = $response;
        }
    };
}

macro_rules! event {
    ($ty:ty, $name:literal) => {
        impl Event for $ty {
            const NAME: &'static str = $name;
        }
    };
}

pub mod target {
    use super::*;
    use crate::cdp::protocol::{BrowserContextId, SessionId, TargetId};

    /// Target Info as reported by the Target domain
    #[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct TargetInfo {
        pub target_id: TargetId,
        #[serde(rename = "type")]
        pub target_type: String,
        #[serde(default)]
        pub title: String,
        #[serde(default)]
        pub url: String,
        #[serde(default)]
        pub attached: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub opener_id: Option<TargetId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub browser_context_id: Option<BrowserContextId>,
    }

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct AttachToTarget {
        pub target_id: TargetId,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub flatten: Option<bool>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct AttachToTargetResult {
        pub session_id: SessionId,
    }
    command!(AttachToTarget, "Target.attachToTarget", AttachToTargetResult);

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct DetachFromTarget {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub session_id: Option<SessionId>,
    }
    command!(DetachFromTarget, "Target.detachFromTarget", Empty);

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CreateTarget {
        pub url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub browser_context_id: Option<BrowserContextId>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub new_window: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub background: Option<bool>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CreateTargetResult {
        pub target_id: TargetId,
    }
    command!(CreateTarget, "Target.createTarget", CreateTargetResult);

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CloseTarget {
        pub target_id: TargetId,
    }

    #[derive(Debug, Clone, Default, Deserialize)]
    pub struct CloseTargetResult {
        #[serde(default)]
        pub success: Option<bool>,
    }
    command!(CloseTarget, "Target.closeTarget", CloseTargetResult);

    #[derive(Debug, Clone, Default, Serialize)]
    pub struct GetTargets {}

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GetTargetsResult {
        pub target_infos: Vec<TargetInfo>,
    }
    command!(GetTargets, "Target.getTargets", GetTargetsResult);

    #[derive(Debug, Clone, Serialize)]
    pub struct SetDiscoverTargets {
        pub discover: bool,
    }
    command!(SetDiscoverTargets, "Target.setDiscoverTargets", Empty);

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct SetAutoAttach {
        pub auto_attach: bool,
        pub wait_for_debugger_on_start: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub flatten: Option<bool>,
    }
    command!(SetAutoAttach, "Target.setAutoAttach", Empty);

    #[derive(Debug, Clone, Default, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CreateBrowserContext {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub dispose_on_detach: Option<bool>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CreateBrowserContextResult {
        pub browser_context_id: BrowserContextId,
    }
    command!(
        CreateBrowserContext,
        "Target.createBrowserContext",
        CreateBrowserContextResult
    );

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct DisposeBrowserContext {
        pub browser_context_id: BrowserContextId,
    }
    command!(DisposeBrowserContext, "Target.disposeBrowserContext", Empty);

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct AttachedToTarget {
        pub session_id: SessionId,
        pub target_info: TargetInfo,
        #[serde(default)]
        pub waiting_for_debugger: bool,
    }
    event!(AttachedToTarget, "Target.attachedToTarget");

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct DetachedFromTarget {
        pub session_id: SessionId,
        #[serde(default)]
        pub target_id: Option<TargetId>,
    }
    event!(DetachedFromTarget, "Target.detachedFromTarget");

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct TargetCreated {
        pub target_info: TargetInfo,
    }
    event!(TargetCreated, "Target.targetCreated");

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct TargetInfoChanged {
        pub target_info: TargetInfo,
    }
    event!(TargetInfoChanged, "Target.targetInfoChanged");

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct TargetDestroyed {
        pub target_id: TargetId,
    }
    event!(TargetDestroyed, "Target.targetDestroyed");
}

pub mod browser {
    use super::*;

    #[derive(Debug, Clone, Default, Serialize)]
    pub struct GetVersion {}

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GetVersionResult {
        pub protocol_version: String,
        pub product: String,
        #[serde(default)]
        pub revision: String,
        #[serde(default)]
        pub user_agent: String,
        #[serde(default)]
        pub js_version: String,
    }
    command!(GetVersion, "Browser.getVersion", GetVersionResult);

    #[derive(Debug, Clone, Default, Serialize)]
    pub struct Close {}
    command!(Close, "Browser.close", Empty);
}

pub mod page {
    use super::*;

    #[derive(Debug, Clone, Default, Serialize)]
    pub struct Enable {}
    command!(Enable, "Page.enable", Empty);

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Navigate {
        pub url: String,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct NavigateResult {
        pub frame_id: String,
        #[serde(default)]
        pub loader_id: Option<String>,
        #[serde(default)]
        pub error_text: Option<String>,
    }
    command!(Navigate, "Page.navigate", NavigateResult);

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    pub struct LoadEventFired {
        pub timestamp: f64,
    }
    event!(LoadEventFired, "Page.loadEventFired");
}

pub mod runtime {
    use super::*;
    use serde_json::Value;

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Evaluate {
        pub expression: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub return_by_value: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub await_promise: Option<bool>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct EvaluateResult {
        /// `Runtime.RemoteObject`, left untyped
        pub result: Value,
        #[serde(default)]
        pub exception_details: Option<Value>,
    }
    command!(Evaluate, "Runtime.evaluate", EvaluateResult);
}

pub mod inspector {
    use super::*;

    #[derive(Debug, Clone, Default, Deserialize)]
    pub struct TargetCrashed {}
    event!(TargetCrashed, "Inspector.targetCrashed");
}
