//! `@directive` compilation.

use crate::components::livewire_mount;
use crate::error::{CompileError, CompileResult};
use crate::scan::{find_balanced_close, is_word_char, map_markup, word_len};
use crate::{Block, Session};
use source_map::Span;

/// Data argument passed by every include-like directive.
pub(crate) const DEFINED_VARS: &str =
    "\\Illuminate\\Support\\Arr::except(get_defined_vars(), ['__data', '__path'])";

const END_LOOP: &str = "$__env->popLoop(); $loop = $__env->getLastLoop();";

/// Compile every known directive outside existing PHP blocks.
pub(crate) fn compile_statements(content: &str, session: &mut Session) -> CompileResult<String> {
    map_markup(content, |run, offset| compile_run(run, offset, session))
}

fn compile_run(run: &str, offset: usize, session: &mut Session) -> CompileResult<String> {
    let mut out = String::with_capacity(run.len());
    let mut last = 0;
    let mut cursor = 0;
    while let Some(found) = run[cursor..].find('@') {
        let at = cursor + found;
        cursor = at + 1;
        if run[..at].chars().next_back().is_some_and(is_word_char) {
            continue;
        }
        let after = &run[at + 1..];
        if let Some(escaped) = after.strip_prefix('@') {
            let len = word_len(escaped);
            if len > 0 {
                out.push_str(&run[last..at]);
                last = at + 1;
                cursor = at + 2 + len;
            }
            continue;
        }
        let len = word_len(after);
        if len == 0 {
            continue;
        }
        let name = &after[..len];
        let name_end = at + 1 + len;
        let mut end = name_end;
        let mut args = None;
        let open = run.len() - run[name_end..].trim_start_matches([' ', '\t']).len();
        if run[open..].starts_with('(') {
            if let Some(close) = find_balanced_close(run, open) {
                args = Some(&run[open + 1..close]);
                end = close + 1;
            }
        }
        let span = Span::new((offset + at) as u32, (offset + end) as u32);
        match compile_directive(name, args, span, session)? {
            Some(compiled) => {
                out.push_str(&run[last..at]);
                out.push_str(&compiled);
                last = end;
                cursor = end;
            }
            None => cursor = name_end,
        }
    }
    out.push_str(&run[last..]);
    Ok(out)
}

/// Compile one directive, or `None` when the name is not a directive.
fn compile_directive(
    name: &str,
    args: Option<&str>,
    span: Span,
    session: &mut Session,
) -> CompileResult<Option<String>> {
    let arg = args.map(str::trim).unwrap_or_default();
    let lower = name.to_ascii_lowercase();
    let compiled = match lower.as_str() {
        "if" => format!("<?php if({arg}): ?>"),
        "elseif" => format!("<?php elseif({arg}): ?>"),
        "else" => "<?php else: ?>".to_string(),
        "unless" => format!("<?php if (! ({arg})): ?>"),
        "isset" => format!("<?php if(isset({arg})): ?>"),
        "empty" if args.is_some() => format!("<?php if(empty({arg})): ?>"),
        "empty" => {
            let number = match session.blocks.pop() {
                Some(Block::Loop { forelse: Some(number) }) => number,
                _ => return Err(CompileError::malformed_directive(name, span)),
            };
            session.blocks.push(Block::ForelseEmpty);
            format!("<?php endforeach; {END_LOOP} if ($__empty_{number}): ?>")
        }
        "auth" => format!("<?php if(auth()->guard({arg})->check()): ?>"),
        "guest" => format!("<?php if(auth()->guard({arg})->guest()): ?>"),
        "can" => format!(
            "<?php if (app(\\Illuminate\\Contracts\\Auth\\Access\\Gate::class)->check({arg})): ?>"
        ),
        "cannot" => format!(
            "<?php if (app(\\Illuminate\\Contracts\\Auth\\Access\\Gate::class)->denies({arg})): ?>"
        ),
        "env" => format!("<?php if(app()->environment({arg})): ?>"),
        "production" => "<?php if(app()->environment('production')): ?>".to_string(),
        "hassection" => {
            format!("<?php if (! empty(trim($__env->yieldContent({arg})))): ?>")
        }
        "endif" | "endunless" | "endisset" | "endempty" | "endauth" | "endguest" | "endcan"
        | "endcannot" | "endenv" | "endproduction" | "endonce" => "<?php endif; ?>".to_string(),

        "switch" => {
            session.switches += 1;
            let number = session.switches;
            session.blocks.push(Block::Switch(number));
            format!("<?php $__switch_{number} = {arg}; if (false): ?>")
        }
        "case" => match session.blocks.last() {
            Some(Block::Switch(number)) => format!("<?php elseif ($__switch_{number} == ({arg})): ?>"),
            _ => return Err(CompileError::malformed_directive(name, span)),
        },
        "default" => match session.blocks.last() {
            Some(Block::Switch(_)) => "<?php else: ?>".to_string(),
            _ => return Ok(None),
        },
        "endswitch" => match session.blocks.pop() {
            Some(Block::Switch(_)) => "<?php endif; ?>".to_string(),
            _ => return Err(CompileError::malformed_directive(name, span)),
        },

        "foreach" => {
            let (iteratee, iteration) = split_foreach(arg)
                .ok_or_else(|| CompileError::malformed_directive(name, span))?;
            session.blocks.push(Block::Loop { forelse: None });
            format!(
                "<?php $__currentLoopData = {iteratee}; $__env->addLoop($__currentLoopData); foreach($__currentLoopData as {iteration}): $__env->incrementLoopIndices(); $loop = $__env->getLastLoop(); ?>"
            )
        }
        "forelse" => {
            let (iteratee, iteration) = split_foreach(arg)
                .ok_or_else(|| CompileError::malformed_directive(name, span))?;
            session.forelse += 1;
            let number = session.forelse;
            session.blocks.push(Block::Loop {
                forelse: Some(number),
            });
            format!(
                "<?php $__empty_{number} = true; $__currentLoopData = {iteratee}; $__env->addLoop($__currentLoopData); foreach($__currentLoopData as {iteration}): $__env->incrementLoopIndices(); $loop = $__env->getLastLoop(); $__empty_{number} = false; ?>"
            )
        }
        "endforeach" => {
            session.pop_loop();
            format!("<?php endforeach; {END_LOOP} ?>")
        }
        "endforelse" => match session.blocks.pop() {
            Some(Block::ForelseEmpty) => "<?php endif; ?>".to_string(),
            Some(Block::Loop { .. }) => format!("<?php endforeach; {END_LOOP} ?>"),
            _ => return Err(CompileError::malformed_directive(name, span)),
        },
        "for" => {
            session.blocks.push(Block::Loop { forelse: None });
            format!("<?php for({arg}): ?>")
        }
        "endfor" => {
            session.pop_loop();
            "<?php endfor; ?>".to_string()
        }
        "while" => {
            session.blocks.push(Block::Loop { forelse: None });
            format!("<?php while({arg}): ?>")
        }
        "endwhile" => {
            session.pop_loop();
            "<?php endwhile; ?>".to_string()
        }
        "break" | "continue" => match args {
            None if lower == "break" && matches!(session.blocks.last(), Some(Block::Switch(_))) => {
                String::new()
            }
            None => format!("<?php {lower}; ?>"),
            Some(_) if !arg.is_empty() && arg.bytes().all(|b| b.is_ascii_digit()) => {
                format!("<?php {lower} {arg}; ?>")
            }
            Some(_) => format!("<?php if({arg}) {lower}; ?>"),
        },

        "php" if args.is_some() => format!("<?php ({arg}); ?>"),
        "unset" => format!("<?php unset({arg}); ?>"),
        "inject" => compile_inject(arg).ok_or_else(|| CompileError::malformed_directive(name, span))?,
        "use" => compile_use(arg).ok_or_else(|| CompileError::malformed_directive(name, span))?,
        "props" | "aware" => format!(
            "<?php $attributes ??= new \\Illuminate\\View\\ComponentAttributeBag(); extract(array_filter(({arg}), 'is_string', ARRAY_FILTER_USE_KEY), EXTR_SKIP); ?>"
        ),

        "include" => format!("<?php echo $__env->make({arg}, {DEFINED_VARS})->render(); ?>"),
        "includeif" => format!(
            "<?php if ($__env->exists({arg})) echo $__env->make({arg}, {DEFINED_VARS})->render(); ?>"
        ),
        "includewhen" => format!("<?php echo $__env->renderWhen({arg}, {DEFINED_VARS}); ?>"),
        "includeunless" => {
            format!("<?php echo $__env->renderUnless({arg}, {DEFINED_VARS}); ?>")
        }
        "includefirst" => format!("<?php echo $__env->first({arg}, {DEFINED_VARS})->render(); ?>"),
        "each" => format!("<?php echo $__env->renderEach({arg}); ?>"),
        "extends" => {
            session
                .footer
                .push(format!("<?php echo $__env->make({arg}, {DEFINED_VARS})->render(); ?>"));
            String::new()
        }
        "livewire" => {
            session.livewire += 1;
            livewire_mount(arg, session.livewire)
        }

        "section" => format!("<?php $__env->startSection({arg}); ?>"),
        "endsection" | "stop" => "<?php $__env->stopSection(); ?>".to_string(),
        "show" => "<?php echo $__env->yieldSection(); ?>".to_string(),
        "append" => "<?php $__env->appendSection(); ?>".to_string(),
        "overwrite" => "<?php $__env->stopSection(true); ?>".to_string(),
        "yield" => format!("<?php echo $__env->yieldContent({arg}); ?>"),
        "push" => format!("<?php $__env->startPush({arg}); ?>"),
        "endpush" => "<?php $__env->stopPush(); ?>".to_string(),
        "prepend" => format!("<?php $__env->startPrepend({arg}); ?>"),
        "endprepend" => "<?php $__env->stopPrepend(); ?>".to_string(),
        "stack" => format!("<?php echo $__env->yieldPushContent({arg}); ?>"),
        "once" => {
            session.once += 1;
            let id = format!("'once-{}'", session.once);
            format!(
                "<?php if (! $__env->hasRenderedOnce({id})): $__env->markAsRenderedOnce({id}); ?>"
            )
        }

        "csrf" => "<?php echo csrf_field(); ?>".to_string(),
        "method" => format!("<?php echo method_field({arg}); ?>"),
        "json" => format!("<?php echo json_encode({arg}) ?>"),
        "class" => {
            format!("class=\"<?php echo \\Illuminate\\Support\\Arr::toCssClasses({arg}); ?>\"")
        }
        "style" => {
            format!("style=\"<?php echo \\Illuminate\\Support\\Arr::toCssStyles({arg}); ?>\"")
        }
        "checked" | "selected" | "disabled" | "readonly" | "required" => {
            format!("<?php if({arg}): echo '{lower}'; endif; ?>")
        }
        "error" => format!(
            "<?php $__errorArgs = [{arg}]; $__bag = $errors->getBag($__errorArgs[1] ?? 'default'); if ($__bag->has($__errorArgs[0])) : if (isset($message)) {{ $__messageOriginal = $message; }} $message = $__bag->first($__errorArgs[0]); ?>"
        ),
        "enderror" => "<?php unset($message); if (isset($__messageOriginal)) { $message = $__messageOriginal; } endif; unset($__errorArgs, $__bag); ?>".to_string(),
        "lang" => format!("<?php echo app('translator')->get({arg}); ?>"),
        "choice" => format!("<?php echo app('translator')->choice({arg}); ?>"),
        "dd" | "dump" => format!("<?php {lower}({arg}); ?>"),

        _ => return Ok(None),
    };
    Ok(Some(compiled))
}

/// Split `$items as $key => $item` at its last ` as `.
fn split_foreach(arg: &str) -> Option<(&str, &str)> {
    let lower = arg.to_ascii_lowercase();
    let bytes = lower.as_bytes();
    let at = lower.rmatch_indices("as").find_map(|(i, _)| {
        let before = i.checked_sub(1).map(|b| bytes[b]);
        let after = bytes.get(i + 2).copied();
        (before.is_some_and(|b| b.is_ascii_whitespace())
            && after.is_some_and(|b| b.is_ascii_whitespace() || b == b'$' || b == b'['))
        .then_some(i)
    })?;
    let iteratee = arg[..at].trim();
    let iteration = arg[at + 2..].trim();
    (!iteratee.is_empty() && !iteration.is_empty()).then_some((iteratee, iteration))
}

fn trim_quotes(text: &str) -> &str {
    text.trim_matches(|c: char| c == ' ' || c == '\'' || c == '"')
}

/// `@use('App\Models\User', 'Member')`
fn compile_use(arg: &str) -> Option<String> {
    let mut segments = arg.split(',');
    let class = trim_quotes(segments.next()?).trim_start_matches('\\');
    if class.is_empty() {
        return None;
    }
    Some(match segments.next().map(trim_quotes) {
        Some(alias) if !alias.is_empty() => format!("<?php use \\{class} as {alias}; ?>"),
        _ => format!("<?php use \\{class}; ?>"),
    })
}

/// `@inject('metrics', 'App\Services\Metrics')`
fn compile_inject(arg: &str) -> Option<String> {
    let (variable, service) = arg.split_once(',')?;
    let variable = trim_quotes(variable);
    if variable.is_empty() {
        return None;
    }
    Some(format!("<?php ${variable} = app({}); ?>", service.trim()))
}
