/// SDP 媒体安全校验
///
/// 对端应答的 SDP 必须协商 DTLS-SRTP，否则拒绝继续通话，防止降级成明文媒体
use thiserror::Error;

/// SRTP-DTLS 的 RTP profile
pub const SRTP_DTLS_PROFILE: &str = "UDP/TLS/RTP/SAVPF";

/// SDP 校验失败原因
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpSecurityError {
    #[error("The DTLS fingerprint and/or setup is missing from the SDP. Please have your administrator verify that the PBX is configured to use SRTP-DTLS.")]
    MissingDtlsAttributes,

    #[error("It appears that the server may not be using the correct media type. Please have your administrator verify that the media type is correctly set to SRTP-DTLS.")]
    InsecureMediaProfile,
}

/// SDP 同时包含 `a=fingerprint` 和 `a=setup` 行
pub fn has_dtls_attributes(sdp: &str) -> bool {
    let mut has_fingerprint = false;
    let mut has_setup = false;
    for field in sdp.lines() {
        has_fingerprint |= field.starts_with("a=fingerprint");
        has_setup |= field.starts_with("a=setup");
    }
    has_fingerprint && has_setup
}

/// 音频媒体行声明了 `UDP/TLS/RTP/SAVPF`
pub fn has_srtp_dtls_media_type(sdp: &str) -> bool {
    sdp.lines()
        .any(|field| field.starts_with("m=audio") && field.contains(SRTP_DTLS_PROFILE))
}

/// 校验 SDP 是否满足 DTLS-SRTP 要求
///
/// 两项都不满足时优先报告缺少 fingerprint/setup
pub fn validate_secure_media(sdp: &str) -> Result<(), SdpSecurityError> {
    if !has_dtls_attributes(sdp) {
        return Err(SdpSecurityError::MissingDtlsAttributes);
    }
    if !has_srtp_dtls_media_type(sdp) {
        return Err(SdpSecurityError::InsecureMediaProfile);
    }
    Ok(())
}
