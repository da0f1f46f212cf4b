use tokio::process::Command;

/// Map short or English language names to the AWS Transcribe locale code
pub fn normalize_language_code(lang: &str) -> String {
    let normalized = match lang.to_lowercase().as_str() {
        "en" | "english" => "en-US",
        "es" | "spanish" => "es-ES",
        "fr" | "french" => "fr-FR",
        "de" | "german" => "de-DE",
        "it" | "italian" => "it-IT",
        "pt" | "portuguese" => "pt-BR",
        "ja" | "japanese" => "ja-JP",
        "ko" | "korean" => "ko-KR",
        "zh" | "chinese" => "zh-CN",
        "ar" | "arabic" => "ar-SA",
        "hi" | "hindi" => "hi-IN",
        "ru" | "russian" => "ru-RU",
        _ => lang, // Return as-is if no mapping found
    };

    normalized.to_string()
}

/// Report missing external tools the audio fallback relies on
pub async fn check_dependencies(yt_dlp_path: &str) -> Vec<String> {
    let mut missing = Vec::new();

    if !check_command_available(yt_dlp_path).await {
        missing.push(format!("{} - required for the audio transcription fallback", yt_dlp_path));
    }

    // yt-dlp needs ffmpeg to extract audio
    if !check_command_available("ffmpeg").await {
        missing.push("ffmpeg - required by yt-dlp to extract audio".to_string());
    }

    missing
}

/// Check if a command is available in PATH
async fn check_command_available(command: &str) -> bool {
    Command::new(command)
        .arg("--version")
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}
