// 命令行入口：medical-quiz <command> [args]

use anyhow::{anyhow, bail};
use futures_util::StreamExt;
use std::io::Write;
use tracing_subscriber::EnvFilter;

use medical_quiz_lib::config::AppConfig;
use medical_quiz_lib::question_repository::LoadState;
use medical_quiz_lib::quiz_service::QuizService;

const USAGE: &str = "用法: medical-quiz <command>

  stats                      题库与进度概况
  chapters                   章节列表
  categories                 题型分类列表
  chapter <name>             某章节的题目
  mistakes                   错题列表
  delete-chapter <name>      删除章节（同时清理错题与进度）
  generate <keyword> [count] 按关键词联网生成题目（默认 5 道）
  analyze                    错题弱点分析
  answer <id> <answer> [review]  作答并判分（review 表示复习模式）
  toggle-mistake <id>        切换错题标记
  explain <id>               AI 解析单题（流式输出）";

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn arg(args: &[String], index: usize, name: &str) -> anyhow::Result<String> {
    args.get(index)
        .cloned()
        .ok_or_else(|| anyhow!("缺少参数 <{}>\n\n{}", name, USAGE))
}

async fn run(service: QuizService, args: &[String]) -> anyhow::Result<()> {
    let command = args.first().map(String::as_str).unwrap_or("stats");

    if let LoadState::Failed(message) = service.load().await? {
        eprintln!("{}", message);
    }

    match command {
        "stats" => print_json(&service.stats().await?)?,
        "chapters" => print_json(&service.chapter_names().await?)?,
        "categories" => print_json(&service.category_names().await?)?,
        "chapter" => {
            let name = arg(args, 1, "name")?;
            print_json(&service.questions_by_chapter(&name).await?)?
        }
        "mistakes" => print_json(&service.mistake_questions().await?)?,
        "delete-chapter" => {
            let name = arg(args, 1, "name")?;
            let removed = service.delete_chapter(&name).await?;
            println!("已删除 {} 道题", removed);
        }
        "answer" => {
            let id = arg(args, 1, "id")?;
            let answer = arg(args, 2, "answer")?;
            let review_mode = args.get(3).map(String::as_str) == Some("review");
            match service.submit_answer(&id, &answer, review_mode).await? {
                Some(true) => println!("✔ 回答正确"),
                Some(false) => println!("✘ 回答错误，已加入错题本"),
                None => println!("主观题，请对照解析自评"),
            }
        }
        "toggle-mistake" => {
            let id = arg(args, 1, "id")?;
            let marked = service.toggle_mistake(&id).await?;
            println!("{}", if marked { "已加入错题本" } else { "已移出错题本" });
        }
        "generate" => {
            let keyword = arg(args, 1, "keyword")?;
            let count = match args.get(2) {
                Some(raw) => raw.parse().map_err(|_| anyhow!("数量必须是正整数: {}", raw))?,
                None => 5,
            };
            match service.generate_questions(&keyword, count).await {
                Ok(questions) => print_json(&questions)?,
                Err(details) => {
                    eprintln!("{}", details.user_message);
                    for suggestion in &details.suggestions {
                        eprintln!("  - {}", suggestion.label);
                    }
                }
            }
        }
        "analyze" => {
            for card in service.analyze_mistakes().await? {
                println!("## {}\n\n{}\n", card.title, card.body);
            }
        }
        "explain" => {
            let id = arg(args, 1, "id")?;
            let mut stream = service.explain_question(&id).await?;
            let mut stdout = std::io::stdout();
            while let Some(chunk) = stream.next().await {
                write!(stdout, "{}", chunk)?;
                stdout.flush()?;
            }
            println!();
        }
        "help" | "-h" | "--help" => println!("{}", USAGE),
        other => bail!("未知命令: {}\n\n{}", other, USAGE),
    }
    Ok(())
}

/// `RUST_LOG` 原样生效；未设置或无法解析时使用 info
fn log_filter(rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::from_env_and_file()?;
    let service = medical_quiz_lib::bootstrap(&config)?;
    let args: Vec<String> = std::env::args().skip(1).collect();
    run(service, &args).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn test_log_filter_respects_rust_log() {
        assert_eq!(log_filter(Some("debug")).max_level_hint(), Some(LevelFilter::DEBUG));
        assert_eq!(log_filter(Some("trace")).max_level_hint(), Some(LevelFilter::TRACE));
        assert_eq!(log_filter(None).max_level_hint(), Some(LevelFilter::INFO));
    }
}
