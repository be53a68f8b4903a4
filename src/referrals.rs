//! 紹介（リファラル）台帳とローカルキャッシュ。
//!
//! 紹介の帰属は冪等: 同じ新規ユーザーを二度登録しても、紹介者の
//! referral セットには 1 件だけ入り、ボーナスも 1 回だけ付与される。
//! 自己紹介は no-op。紹介者のドキュメントが存在しない場合も no-op
//! （ログのみ、リトライしない）。
//!
//! ## キャッシュ方針
//!
//! ライブ購読が最初のスナップショットを届けるまでの間、UI に既知の
//! 紹介一覧を出すため、localStorage に `referrals_<userId>` キーで
//! 最終既知セットを保存する。形式はバージョン付き JSON
//! （バージョン不一致は破棄して新規扱い）。

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::diag;
use crate::remote::{from_doc, DocStore, StoreError, UserDoc, USER_COLLECTION};
use crate::state::{Referral, StateStore};

/// One-time bonus credited to the referrer per attributed friend.
pub const REFERRAL_BONUS: f64 = 100.0;

/// キャッシュ形式のバージョン。破壊的変更時にインクリメント。
const CACHE_VERSION: u32 = 1;

/// Attribute `new_user_id` to `referrer_id`: add the referral entry and
/// credit the bonus in one combined write. Returns whether anything was
/// attributed.
///
/// `local` is the session's own state when the loaded session *is* the
/// referrer; the remote change is mirrored locally right away (same
/// idempotency check) instead of waiting for the watch round-trip.
pub fn attribute_referral(
    store: &mut dyn DocStore,
    local: Option<&mut StateStore>,
    new_user_id: &str,
    referrer_id: &str,
) -> Result<bool, StoreError> {
    if new_user_id == referrer_id {
        return Ok(false);
    }

    let doc = match store.get(USER_COLLECTION, referrer_id)? {
        Some(d) => d,
        None => {
            diag::log(&format!(
                "referrals: referrer {referrer_id} has no document, skipping attribution"
            ));
            return Ok(false);
        }
    };
    let referrer: UserDoc = from_doc(doc)?;

    // Checked here, not left to the store's own dedup.
    if referrer.referrals.iter().any(|r| r.id == new_user_id) {
        return Ok(false);
    }

    let mut referrals = referrer.referrals;
    referrals.push(Referral {
        id: new_user_id.to_string(),
    });
    let new_balance = referrer.balance + REFERRAL_BONUS;

    let mut patch = crate::remote::Doc::new();
    patch.insert(
        "referrals".into(),
        serde_json::to_value(&referrals).map_err(|e| StoreError::Codec(e.to_string()))?,
    );
    patch.insert("balance".into(), json!(new_balance));
    store.merge(USER_COLLECTION, referrer_id, patch)?;

    // Optimistic local reflection when this session is the referrer.
    if let Some(state) = local {
        if state.profile().id == referrer_id && state.add_referral(new_user_id) {
            state.credit(REFERRAL_BONUS);
        }
    }

    Ok(true)
}

/// バージョン付きキャッシュの中身。
#[derive(Serialize, Deserialize)]
struct ReferralCache {
    version: u32,
    referrals: Vec<Referral>,
}

fn cache_key(user_id: &str) -> String {
    format!("referrals_{user_id}")
}

fn encode_cache(referrals: &[Referral]) -> Result<String, serde_json::Error> {
    serde_json::to_string(&ReferralCache {
        version: CACHE_VERSION,
        referrals: referrals.to_vec(),
    })
}

fn decode_cache(raw: &str) -> Option<Vec<Referral>> {
    let cache: ReferralCache = serde_json::from_str(raw).ok()?;
    if cache.version != CACHE_VERSION {
        return None;
    }
    Some(cache.referrals)
}

/// 最終既知の紹介セットを localStorage へ書く。失敗はログのみ。
#[cfg(target_arch = "wasm32")]
pub fn remember(user_id: &str, referrals: &[Referral]) {
    let json = match encode_cache(referrals) {
        Ok(j) => j,
        Err(e) => {
            diag::warn(&format!("referrals: キャッシュのシリアライズに失敗: {e}"));
            return;
        }
    };
    if let Some(storage) = web_sys::window().and_then(|w| w.local_storage().ok().flatten()) {
        if let Err(e) = storage.set_item(&cache_key(user_id), &json) {
            diag::warn(&format!("referrals: localStorage への保存に失敗: {e:?}"));
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub fn remember(_user_id: &str, _referrals: &[Referral]) {}

/// 起動直後の UI 用に、キャッシュ済みの紹介セットを読む。
/// 壊れている・バージョン不一致の場合は破棄して `None`。
#[cfg(target_arch = "wasm32")]
pub fn recall(user_id: &str) -> Option<Vec<Referral>> {
    let storage = web_sys::window()?.local_storage().ok()??;
    let raw = storage.get_item(&cache_key(user_id)).ok()??;
    match decode_cache(&raw) {
        Some(referrals) => Some(referrals),
        None => {
            let _ = storage.remove_item(&cache_key(user_id));
            None
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub fn recall(_user_id: &str) -> Option<Vec<Referral>> {
    None
}
