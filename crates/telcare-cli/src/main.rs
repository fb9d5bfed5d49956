mod cli_args;

use std::io::Write;
use std::sync::Arc;

use clap::Parser;
use cli_args::{
    BillCommand, BillInquireArgs, BillMonthsArgs, Cli, Command, LoginArgs, ProductChangeArgs,
    ProductCommand, RegisterArgs,
};
use rpassword::prompt_password;

use telcare_core::guard::{self, GuardDecision, RouteRequest};
use telcare_core::restore::restore_session;
use telcare_core::services::{auth, bill, product};
use telcare_core::state::AuthStore;
use telcare_core::store::SessionStore;
use telcare_core::types::{PERMISSION_BILL_INQUIRY, PERMISSION_PRODUCT_CHANGE};
use telcare_core::wizard::{
    ChangeWizard, CheckpointCallback, WizardState, format_applied_from, format_processed_at,
};
use telcare_core::{LoggingDestination, PortalClients, config_path, init_logging, load_config};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = dispatch(cli).await {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

/// Everything a command needs: configuration, the shared session store, and
/// the per-area API clients.
struct Portal {
    store: Arc<SessionStore>,
    clients: PortalClients,
    auth: AuthStore,
}

impl Portal {
    fn open(verbose: bool) -> Result<Self, String> {
        let destination = if verbose {
            LoggingDestination::FileAndStderr
        } else {
            LoggingDestination::FileOnly
        };
        if let Err(err) = init_logging(destination) {
            eprintln!("Warning: logging unavailable: {err}");
        }

        let load = load_config();
        for warning in &load.warnings {
            eprintln!("Warning: {warning}");
        }

        let store = Arc::new(SessionStore::open_default());
        let clients = PortalClients::from_config(&load.config.portal, Arc::clone(&store))
            .map_err(|err| err.to_string())?;

        let mut auth = AuthStore::new();
        restore_session(&store, &mut auth, chrono::Utc::now().timestamp());

        Ok(Self {
            store,
            clients,
            auth,
        })
    }

    /// Gate a command the way the portal gates a route.
    fn require(&self, path: &str, permission: Option<&str>) -> Result<(), String> {
        match guard::evaluate(
            &self.auth,
            &RouteRequest {
                path,
                required_permission: permission,
            },
        ) {
            GuardDecision::Allow => Ok(()),
            GuardDecision::RedirectToLogin { .. } => {
                Err("로그인이 필요합니다. `telcare login`을 먼저 실행해주세요.".to_string())
            }
            GuardDecision::RedirectToDefault => {
                Err("해당 메뉴에 대한 권한이 없습니다.".to_string())
            }
        }
    }

    fn line_number(&self) -> Result<String, String> {
        self.auth
            .user()
            .map(|user| user.line_number.clone())
            .ok_or_else(|| "로그인이 필요합니다.".to_string())
    }
}

async fn dispatch(cli: Cli) -> Result<(), String> {
    let mut portal = Portal::open(cli.verbose)?;

    match cli.command {
        Command::Login(args) => run_login(&mut portal, args).await,
        Command::Logout => run_logout(&mut portal).await,
        Command::Register(args) => run_register(&portal, args).await,
        Command::Whoami => run_whoami(&portal),
        Command::Bill(cmd) => match cmd {
            BillCommand::Menu => run_bill_menu(&portal).await,
            BillCommand::Inquire(args) => run_bill_inquire(&portal, args).await,
            BillCommand::Months(args) => run_bill_months(&portal, args).await,
        },
        Command::Product(cmd) => match cmd {
            ProductCommand::Current => run_product_current(&portal).await,
            ProductCommand::List => run_product_list(&portal).await,
            ProductCommand::Change(args) => run_product_change(&portal, args).await,
        },
        Command::Config => run_config(),
    }
}

async fn run_login(portal: &mut Portal, args: LoginArgs) -> Result<(), String> {
    let password = match args.password {
        Some(password) => password,
        None => prompt_password("비밀번호: ")
            .map_err(|err| format!("Failed to read password: {err}"))?,
    };

    let input = auth::LoginInput {
        user_id: args.user_id,
        password,
        auto_login: args.auto_login,
    };

    portal.auth.login_start();
    let session = match auth::login(
        &portal.clients.user,
        &input,
        chrono::Utc::now().timestamp(),
    )
    .await
    {
        Ok(session) => session,
        Err(err) => {
            let message = err.display_message();
            portal.auth.login_failure(message.clone());
            return Err(message);
        }
    };

    let user_id = session.user.user_id.clone();
    portal.auth.login_success(session, &portal.store);

    // Enrich the sparse login profile; the session stands even if this fails.
    match auth::fetch_user_info(&portal.clients.user, &user_id).await {
        Ok(patch) => portal.auth.update_user(&patch, &portal.store),
        Err(err) => eprintln!("Warning: 사용자 정보 조회에 실패했습니다: {err}"),
    }

    let name = portal
        .auth
        .user()
        .map(|user| {
            if user.user_name.is_empty() {
                user.user_id.clone()
            } else {
                user.user_name.clone()
            }
        })
        .unwrap_or_default();
    println!("{name}님, 로그인되었습니다.");
    Ok(())
}

async fn run_logout(portal: &mut Portal) -> Result<(), String> {
    if !portal.auth.is_authenticated() {
        println!("로그인되어 있지 않습니다.");
        return Ok(());
    }
    auth::logout(&portal.clients.user).await;
    portal.auth.logout(&portal.store);
    println!("로그아웃되었습니다.");
    Ok(())
}

async fn run_register(portal: &Portal, args: RegisterArgs) -> Result<(), String> {
    let password =
        prompt_password("암호: ").map_err(|err| format!("Failed to read password: {err}"))?;
    let confirm_password = prompt_password("암호 확인: ")
        .map_err(|err| format!("Failed to read password: {err}"))?;

    let input = auth::RegisterInput {
        user_id: args.user_id,
        user_name: args.user_name,
        line_number: args.line_number,
        password,
        confirm_password,
    };

    match auth::register(&portal.clients.user, &portal.clients.kos_mock, &input).await {
        Ok(customer_id) => {
            println!("{}", auth::REGISTER_SUCCESS_MESSAGE);
            println!("고객 ID: {customer_id}");
            Ok(())
        }
        Err(telcare_core::ApiError::FieldErrors { fields, .. }) => {
            let mut lines: Vec<String> = fields
                .iter()
                .map(|(field, message)| format!("  {field}: {message}"))
                .collect();
            lines.sort();
            Err(format!("입력값을 확인해주세요.\n{}", lines.join("\n")))
        }
        Err(err) => Err(err.display_message()),
    }
}

fn run_whoami(portal: &Portal) -> Result<(), String> {
    match portal.auth.user() {
        Some(user) => {
            println!("사용자 ID: {}", user.user_id);
            if !user.user_name.is_empty() {
                println!("이름: {}", user.user_name);
            }
            println!("회선번호: {}", user.line_number);
            println!("고객 ID: {}", user.customer_id);
            if user.permissions.is_empty() {
                println!("권한: (없음)");
            } else {
                println!("권한: {}", user.permissions.join(", "));
            }
            Ok(())
        }
        None => {
            println!("로그인되어 있지 않습니다.");
            Ok(())
        }
    }
}

async fn run_bill_menu(portal: &Portal) -> Result<(), String> {
    portal.require("/bill", Some(PERMISSION_BILL_INQUIRY))?;
    let menu = bill::fetch_bill_menu(&portal.clients.bill)
        .await
        .map_err(|err| err.display_message())?;

    println!("회선번호: {}", menu.customer_info.line_number);
    println!("이번 달: {}", menu.current_month);
    println!("조회 가능한 월:");
    for month in &menu.available_months {
        println!("  {month}");
    }
    Ok(())
}

async fn run_bill_inquire(portal: &Portal, args: BillInquireArgs) -> Result<(), String> {
    portal.require("/bill", Some(PERMISSION_BILL_INQUIRY))?;
    let line_number = match args.line {
        Some(line) => line,
        None => portal.line_number()?,
    };
    let month = match args.month {
        Some(month) => month,
        None => {
            let menu = bill::fetch_bill_menu(&portal.clients.bill)
                .await
                .map_err(|err| err.display_message())?;
            menu.current_month
        }
    };

    let snapshot = bill::inquire_bill(
        &portal.clients.bill,
        &bill::BillInquiryInput {
            line_number,
            billing_month: Some(month.clone()),
        },
    )
    .await
    .map_err(|err| err.display_message())?;

    let info = &snapshot.bill_info;
    println!("{} 청구 내역 ({})", month, info.line_number);
    println!("  요금제: {}", info.product_name);
    println!("  월정액: {}원", info.monthly_fee);
    println!("  사용 요금: {}원", info.usage_fee);
    println!("  할인 금액: {}원", info.discount_amount);
    println!("  청구 금액: {}원", info.total_fee);
    if !info.due_date.is_empty() {
        println!("  납부 기한: {}", info.due_date);
    }
    Ok(())
}

async fn run_bill_months(portal: &Portal, args: BillMonthsArgs) -> Result<(), String> {
    portal.require("/bill", Some(PERMISSION_BILL_INQUIRY))?;
    let line_number = match args.line {
        Some(line) => line,
        None => portal.line_number()?,
    };

    let months = bill::fetch_available_months(&portal.clients.kos_mock, &line_number)
        .await
        .map_err(|err| err.display_message())?;
    for month in months {
        println!("{month}");
    }
    Ok(())
}

async fn run_product_current(portal: &Portal) -> Result<(), String> {
    portal.require("/products", Some(PERMISSION_PRODUCT_CHANGE))?;
    let line_number = portal.line_number()?;
    let info = product::fetch_customer_info(&portal.clients.product, &line_number)
        .await
        .map_err(|err| err.display_message())?;

    let current = &info.current_product;
    println!("회선번호: {} ({})", info.line_number, info.line_status);
    println!("현재 요금제: {} [{}]", current.product_name, current.product_code);
    println!("  월정액: {}원", current.monthly_fee);
    println!("  데이터: {}", current.data_allowance);
    println!("  음성: {}", current.voice_allowance);
    if let Some(contract) = &info.contract_info {
        println!("  약정 만료일: {}", contract.term_end_date);
    }
    Ok(())
}

async fn run_product_list(portal: &Portal) -> Result<(), String> {
    portal.require("/products", Some(PERMISSION_PRODUCT_CHANGE))?;
    let line_number = portal.line_number()?;
    let info = product::fetch_customer_info(&portal.clients.product, &line_number)
        .await
        .map_err(|err| err.display_message())?;
    let available = product::fetch_available_products(
        &portal.clients.product,
        Some(&info.current_product.product_code),
    )
    .await
    .map_err(|err| err.display_message())?;

    println!("변경 가능한 상품 {}건:", available.total_count);
    for item in &available.products {
        println!(
            "  {} {} - 월 {}원 (데이터 {}, 음성 {})",
            item.product_code,
            item.product_name,
            item.monthly_fee,
            item.data_allowance,
            item.voice_allowance
        );
    }
    Ok(())
}

async fn run_product_change(portal: &Portal, args: ProductChangeArgs) -> Result<(), String> {
    portal.require("/products", Some(PERMISSION_PRODUCT_CHANGE))?;
    let line_number = portal.line_number()?;

    let info = product::fetch_customer_info(&portal.clients.product, &line_number)
        .await
        .map_err(|err| err.display_message())?;
    let available = product::fetch_available_products(
        &portal.clients.product,
        Some(&info.current_product.product_code),
    )
    .await
    .map_err(|err| err.display_message())?;

    let target = available
        .products
        .iter()
        .find(|item| item.product_code == args.target)
        .cloned()
        .ok_or_else(|| format!("변경 가능한 상품이 아닙니다: {}", args.target))?;

    let mut wizard = ChangeWizard::begin(line_number, info.current_product);
    wizard
        .select(target)
        .map_err(|err| err.to_string())?;

    println!("사전 검증을 시작합니다.");
    let progress: CheckpointCallback = Arc::new(|event| {
        println!(
            "  [{}/{}] {}",
            event.index + 1,
            event.total,
            event.label
        );
    });
    let validation = wizard
        .run_validation(&portal.clients.product, Some(progress))
        .await
        .map_err(|err| err.to_string())?
        .clone();

    if wizard.state() == (WizardState::Validated { passed: false }) {
        for detail in &validation.validation_details {
            println!("  {}: {} ({})", detail.check_type, detail.result, detail.message);
        }
        return Err(validation
            .failure_reason
            .unwrap_or_else(|| "사전 검증에 실패했습니다.".to_string()));
    }

    let summary = wizard
        .request_confirmation()
        .map_err(|err| err.to_string())?;
    println!("변경 대상: {}", summary.product_name);
    println!("월 요금: {}원 (변동 {:+}원)", summary.monthly_fee, summary.fee_delta);

    if !args.yes && !confirm("진행하시겠습니까? (y/N): ")? {
        wizard
            .cancel_confirmation()
            .map_err(|err| err.to_string())?;
        println!("변경을 취소했습니다.");
        return Ok(());
    }

    let today = chrono::Local::now().date_naive();
    let outcome = wizard
        .apply(&portal.clients.product, today)
        .await
        .map_err(|err| err.to_string())?;

    if outcome.success {
        println!("상품 변경이 완료되었습니다.");
        println!("  변경된 상품: {}", outcome.displayed_product.product_name);
        println!("  월 요금: {}원", outcome.displayed_product.monthly_fee);
        println!("  적용일: {}", format_applied_from(outcome.applied_from));
        println!(
            "  처리 시간: {}",
            format_processed_at(&outcome.response.processed_at)
        );
    } else {
        let message = if outcome.response.result_message.is_empty() {
            "상품 변경에 실패했습니다.".to_string()
        } else {
            outcome.response.result_message.clone()
        };
        return Err(message);
    }
    Ok(())
}

fn run_config() -> Result<(), String> {
    let load = load_config();
    for warning in &load.warnings {
        eprintln!("Warning: {warning}");
    }
    println!("config: {}", config_path().display());
    let portal = &load.config.portal;
    println!("api_group: {}", portal.api_group);
    println!("user_host: {}", portal.user_host);
    println!("bill_host: {}", portal.bill_host);
    println!("product_host: {}", portal.product_host);
    println!("kos_mock_host: {}", portal.kos_mock_host);
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool, String> {
    print!("{prompt}");
    std::io::stdout()
        .flush()
        .map_err(|err| err.to_string())?;
    let mut answer = String::new();
    std::io::stdin()
        .read_line(&mut answer)
        .map_err(|err| err.to_string())?;
    let answer = answer.trim().to_ascii_lowercase();
    Ok(answer == "y" || answer == "yes")
}
