//! Scorecard ingest: validate, rate-limit, pass through to the backend.

use tracing::info;

use crate::bus::router::{EventContext, Routed};
use crate::bus::BusMessage;
use crate::errors::CoreError;
use crate::events::{ScorecardProcessingFailed, ScorecardUploaded, MAX_SCORECARD_BYTES};
use crate::gateway::MessageContent;
use crate::BotError;

use super::{respond_to_requester, Capabilities};

const ALLOWED_EXTENSIONS: [&str; 2] = ["csv", "xlsx"];

/// Checks one upload against the ingest rules. Pure so the boundary cases
/// are testable without a bus.
pub fn validate_upload(payload: &ScorecardUploaded) -> Result<(), CoreError> {
    if payload.guild_id.is_empty() || payload.round_id.is_empty() || payload.uploader_id.is_empty()
    {
        return Err(CoreError::Validation(
            "scorecard upload is missing guild, round or uploader id".to_string(),
        ));
    }
    if payload.size_bytes > MAX_SCORECARD_BYTES {
        return Err(CoreError::Validation(format!(
            "scorecard of {} bytes exceeds the {} byte limit",
            payload.size_bytes, MAX_SCORECARD_BYTES
        )));
    }
    if payload.file_url.is_some() {
        let name = payload
            .file_name
            .as_deref()
            .or(payload.file_url.as_deref())
            .unwrap_or_default();
        let stem = name.split(&['?', '#'][..]).next().unwrap_or(name);
        let extension = stem.rsplit('.').next().unwrap_or_default().to_lowercase();
        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(CoreError::Validation(format!(
                "scorecard extension {:?} is not one of csv, xlsx",
                extension
            )));
        }
    }
    Ok(())
}

/// Validated and admitted uploads pass straight through to the backend's
/// processing topic; everything else is refused here at the edge.
pub async fn scorecard_uploaded(
    caps: Capabilities,
    ctx: EventContext,
    message: BusMessage,
) -> Result<Vec<Routed>, BotError> {
    let payload: ScorecardUploaded = message.decode()?;
    validate_upload(&payload)?;

    if !caps.scorecard_limiter.admit(&payload.guild_id) {
        caps.metrics.record_rate_limited();
        return Err(CoreError::RateLimited(format!(
            "scorecard uploads for guild {} are over the window limit",
            payload.guild_id
        ))
        .into());
    }

    info!(
        guild_id = %payload.guild_id,
        round_id = %payload.round_id,
        size_bytes = payload.size_bytes,
        "scorecard accepted for processing"
    );
    Ok(vec![Routed::unrouted(&payload, ctx.metadata.clone())?])
}

/// A parse or import failure goes back to whoever uploaded the scorecard.
pub async fn scorecard_failed(
    caps: Capabilities,
    ctx: EventContext,
    message: BusMessage,
) -> Result<Vec<Routed>, BotError> {
    let payload: ScorecardProcessingFailed = message.decode()?;
    let reason = if payload.reason.trim().is_empty() {
        "the backend could not process it".to_string()
    } else {
        payload.reason.clone()
    };
    info!(
        guild_id = %payload.guild_id,
        round_id = %payload.round_id,
        uploader_id = %payload.uploader_id,
        "scorecard processing failed"
    );
    respond_to_requester(
        &caps,
        &ctx.metadata,
        &payload.uploader_id,
        MessageContent::text(format!(
            "Your scorecard for round {} was not processed: {}",
            payload.round_id, reason
        )),
    )
    .await?;
    Ok(vec![])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload() -> ScorecardUploaded {
        ScorecardUploaded {
            guild_id: "G1".into(),
            round_id: "R1".into(),
            uploader_id: "U1".into(),
            file_url: Some("https://cdn.example/cards/round1.csv".into()),
            file_name: Some("round1.csv".into()),
            size_bytes: 1024,
        }
    }

    #[test]
    fn accepts_a_well_formed_upload() {
        assert!(validate_upload(&upload()).is_ok());
    }

    #[test]
    fn size_boundary_is_inclusive() {
        let mut at_limit = upload();
        at_limit.size_bytes = MAX_SCORECARD_BYTES;
        assert!(validate_upload(&at_limit).is_ok());

        let mut over = upload();
        over.size_bytes = MAX_SCORECARD_BYTES + 1;
        assert!(matches!(
            validate_upload(&over),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn mandatory_ids_are_enforced() {
        for wipe in [
            |u: &mut ScorecardUploaded| u.guild_id.clear(),
            |u: &mut ScorecardUploaded| u.round_id.clear(),
            |u: &mut ScorecardUploaded| u.uploader_id.clear(),
        ] {
            let mut bad = upload();
            wipe(&mut bad);
            assert!(validate_upload(&bad).is_err());
        }
    }

    #[test]
    fn url_uploads_must_be_csv_or_xlsx() {
        let mut xlsx = upload();
        xlsx.file_name = Some("Round 1 FINAL.XLSX".into());
        assert!(validate_upload(&xlsx).is_ok());

        let mut pdf = upload();
        pdf.file_name = Some("scores.pdf".into());
        assert!(validate_upload(&pdf).is_err());

        // No file name: the extension comes off the URL, query ignored.
        let mut url_only = upload();
        url_only.file_name = None;
        url_only.file_url = Some("https://cdn.example/cards/r1.csv?ex=123".into());
        assert!(validate_upload(&url_only).is_ok());
    }

    #[test]
    fn direct_uploads_skip_the_extension_check() {
        let mut direct = upload();
        direct.file_url = None;
        direct.file_name = None;
        assert!(validate_upload(&direct).is_ok());
    }
}
