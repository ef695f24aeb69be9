//! Keyword dispatch in front of the answering engine.
//!
//! A chat front end first routes each incoming message: a few fixed keywords
//! get canned replies, everything else is a question for
//! [`RagEngine::answer_question`](crate::RagEngine::answer_question).

/// Sent when a user starts a conversation.
pub const WELCOME: &str = "お友達追加ありがとうございます！\n野々市市の暮らしについて質問してください。\n「メニュー」と入力すると、使い方を確認できます。";

/// Shown when a question could not be answered.
pub const FALLBACK: &str = "申し訳ありません。ただいま回答を作成できませんでした。しばらくしてからもう一度お試しください。";

const MENU: &str = "【メインメニュー】\n\
    ごみの出し方、施設の利用時間、各種手続きなど、野々市市の生活情報について自由に質問してください。\n\
    例: 「粗大ごみの出し方は？」\n\
    「自己紹介」と入力すると、このボットについて説明します。";

const INTRODUCTION: &str = "私は野々市市の生活情報資料をもとに質問に答えるチャットボットです。\
    回答は資料から検索した内容に基づいて作成しますが、正確な情報は市の窓口でもご確認ください。";

/// What to do with one incoming message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Send this fixed text.
    Canned(&'static str),
    /// Answer this question with the engine.
    Ask(String),
}

/// Route a message to a canned reply or a question.
///
/// Keywords are matched after trimming and lowercasing. The question passed
/// on is the trimmed original text.
pub fn route(message: &str) -> Reply {
    let trimmed = message.trim();
    match trimmed.to_lowercase().as_str() {
        "" | "メニュー" | "menu" | "ヘルプ" | "help" => Reply::Canned(MENU),
        "自己紹介" => Reply::Canned(INTRODUCTION),
        _ => Reply::Ask(trimmed.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_get_canned_replies() {
        assert_eq!(route("メニュー"), Reply::Canned(MENU));
        assert_eq!(route("  HELP \n"), Reply::Canned(MENU));
        assert_eq!(route("自己紹介"), Reply::Canned(INTRODUCTION));
    }

    #[test]
    fn blank_message_gets_the_menu() {
        assert_eq!(route("   "), Reply::Canned(MENU));
    }

    #[test]
    fn anything_else_is_a_question() {
        assert_eq!(route(" 今日は何の日 "), Reply::Ask("今日は何の日".to_string()));
        assert_eq!(route("Menu please"), Reply::Ask("Menu please".to_string()));
    }
}
