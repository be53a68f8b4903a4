//! Session identity: the Telegram WebApp bridge and the offline placeholder.
//!
//! When the host bridge is absent (opening the page outside Telegram) the
//! session runs under a placeholder identity. The placeholder must never
//! reach the remote store: no sync, no heartbeat, no referral attribution.

/// Id of the non-persisted fallback identity.
pub const PLACEHOLDER_ID: &str = "guest";

/// Prefix of the startup parameter that encodes a referrer.
const REFERRER_PREFIX: &str = "ref_";

#[derive(Clone, Debug, PartialEq)]
pub struct Identity {
    pub id: String,
    pub first_name: String,
    pub username: String,
    pub photo_url: String,
}

impl Identity {
    pub fn placeholder() -> Self {
        Self {
            id: PLACEHOLDER_ID.to_string(),
            first_name: "Guest".to_string(),
            username: String::new(),
            photo_url: String::new(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.id == PLACEHOLDER_ID
    }
}

/// Extract the referrer id from a start parameter like `ref_12345`.
/// Anything else (including an empty id after the prefix) yields `None`.
pub fn parse_referrer_param(param: &str) -> Option<&str> {
    let id = param.strip_prefix(REFERRER_PREFIX)?;
    if id.is_empty() {
        return None;
    }
    Some(id)
}

/// What session start resolves from the host bridge.
pub struct Launch {
    pub identity: Identity,
    /// Referrer id decoded from the start parameter, if any.
    pub referrer: Option<String>,
}

impl Launch {
    pub fn offline() -> Self {
        Self {
            identity: Identity::placeholder(),
            referrer: None,
        }
    }
}

/// Read `window.Telegram.WebApp.initDataUnsafe` and the start parameter.
/// Falls back to the placeholder launch when any step of the walk fails.
#[cfg(target_arch = "wasm32")]
pub fn resolve_launch() -> Launch {
    resolve_from_bridge().unwrap_or_else(Launch::offline)
}

#[cfg(target_arch = "wasm32")]
fn resolve_from_bridge() -> Option<Launch> {
    use js_sys::Reflect;
    use wasm_bindgen::JsValue;

    fn get(obj: &JsValue, key: &str) -> Option<JsValue> {
        let v = Reflect::get(obj, &JsValue::from_str(key)).ok()?;
        if v.is_undefined() || v.is_null() {
            None
        } else {
            Some(v)
        }
    }

    fn get_string(obj: &JsValue, key: &str) -> String {
        get(obj, key)
            .and_then(|v| v.as_string())
            .unwrap_or_default()
    }

    let window: JsValue = web_sys::window()?.into();
    let telegram = get(&window, "Telegram")?;
    let web_app = get(&telegram, "WebApp")?;
    let init_data = get(&web_app, "initDataUnsafe")?;
    let user = get(&init_data, "user")?;

    // Telegram delivers the user id as a number; stringify for the doc key.
    let id = get(&user, "id").and_then(|v| {
        v.as_string()
            .or_else(|| v.as_f64().map(|n| format!("{}", n as i64)))
    })?;

    let identity = Identity {
        id,
        first_name: get_string(&user, "first_name"),
        username: get_string(&user, "username"),
        photo_url: get_string(&user, "photo_url"),
    };

    let referrer = get(&init_data, "start_param")
        .and_then(|v| v.as_string())
        .as_deref()
        .and_then(parse_referrer_param)
        .map(str::to_string);

    Some(Launch { identity, referrer })
}
